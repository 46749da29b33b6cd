//! rireki - keyword and date-range search over an imported event history.
//!
//! Events arrive as CSV exports in a legacy encoding. rireki normalizes each
//! row (inferring the organizing group from the title when the export omits
//! it), stores it once per event id in [redb](https://github.com/cberner/redb),
//! and answers AND/OR keyword plus date-range queries through a
//! [Tantivy](https://github.com/quickwit-oss/tantivy) index. Results come
//! back ranked by vote score and date, one page at a time, together with the
//! most frequent organizing groups and organizers.
//!
//! # Quick start
//!
//! ```no_run
//! use rireki::{DataDir, EventStore, Settings, ConfigDb};
//! use rireki::query::{Operator, SearchQuery};
//! use rireki::{ingestion, search};
//!
//! let data_dir = DataDir::resolve(None).unwrap();
//! let config_db = ConfigDb::open(&data_dir.config_db()).unwrap();
//! let settings = Settings::load(&config_db).unwrap();
//! let store = EventStore::open(&data_dir).unwrap();
//!
//! ingestion::ingest_csv(&store, &settings, "export.csv".as_ref()).unwrap();
//!
//! let query = SearchQuery::new(vec!["ゲートボール".into(), "投げる".into()])
//!     .with_operator(Operator::Or)
//!     .with_range(Some("2012/01/01"), Some("2012/01/31"));
//! let outcome = search::execute_search(&store, &settings, &query, 1).unwrap();
//! for event in &outcome.page.records {
//!     println!("{} [{}] {}", event.id, event.score, event.title);
//! }
//! ```

pub mod aggregate;
pub mod config_db;
pub mod data_dir;
pub mod error;
pub mod event;
pub mod event_db;
pub mod inbox;
pub mod ingestion;
pub mod normalize;
pub mod paginate;
pub mod period;
pub mod query;
pub mod search;
pub mod settings;
pub mod store;
pub mod tantivy_index;
pub mod text_util;
pub mod vote;

pub use config_db::ConfigDb;
pub use data_dir::DataDir;
pub use error::{Error, Result};
pub use event::Event;
pub use event_db::EventDb;
pub use settings::Settings;
pub use store::{EventStore, IndexStore};
pub use tantivy_index::SearchIndex;
