use clap::Parser;
use rireki::{
    ConfigDb,
    DataDir,
    Error,
    EventStore,
    IndexStore,
    Result,
    Settings,
    event::Event,
    inbox,
    ingestion::{self, IngestReport},
    period::{self, Topic, YearMonth},
    query::SearchQuery,
    search,
    text_util,
    vote,
};
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Cli, Command, ConfigAction, TopicAction};

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("RIREKI_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    if let Command::Completions(args) = &cli.command {
        args.generate();
        return Ok(());
    }

    let data_dir = DataDir::resolve(cli.data_dir.as_deref())?;
    let config_db = ConfigDb::open(&data_dir.config_db())?;

    match cli.command {
        Command::Import(args) => {
            let settings = Settings::load(&config_db)?;
            let store = EventStore::open(&data_dir)?;
            let report = match args.path {
                Some(path) => {
                    ingestion::import_file(&store, &settings, &path, args.keep)?
                }
                None => {
                    let dir = match settings.inbox_dir.clone() {
                        Some(dir) => dir,
                        None => data_dir.inbox_dir()?,
                    };
                    ingestion::import_inbox(&store, &settings, &dir, args.keep)?
                }
            };
            print_report(&report, args.json)?;
        }
        Command::Search(args) => {
            let settings = Settings::load(&config_db)?;
            let store = EventStore::open(&data_dir)?;

            let keywords = args
                .keywords
                .iter()
                .flat_map(|k| text_util::split_keywords(k))
                .collect();
            let query = SearchQuery::new(keywords)
                .with_operator(args.operator.into())
                .with_range(args.start.as_deref(), args.end.as_deref());

            let outcome =
                search::execute_search(&store, &settings, &query, args.page)?;
            if args.json {
                search::format_json(&outcome)?;
            } else {
                search::format_human(&outcome);
            }
        }
        Command::Stats(args) => {
            let settings = Settings::load(&config_db)?;
            let month = YearMonth::parse(&args.month)?;
            let topic = period::find_topic(&config_db, &args.topic)?;
            let store = EventStore::open(&data_dir)?;

            let outcome = period::execute_topic_stats(
                &store, &settings, month, &topic, args.page,
            );
            if args.json {
                search::format_json(&outcome)?;
            } else {
                println!("{} in {month}", topic.name);
                search::format_human(&outcome);
            }
        }
        Command::Topics(args) => {
            let month = match args.month {
                Some(m) => YearMonth::parse(&m)?,
                None => YearMonth::current(),
            };
            let topics = period::load_topics(&config_db)?;
            let store = EventStore::open(&data_dir)?;
            let counts = period::count_topics(&store, month, &topics);

            if args.json {
                let value = serde_json::json!({
                    "month": month.to_string(),
                    "topics": counts,
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else if counts.is_empty() {
                println!("No topics defined.");
            } else {
                println!("{month}");
                for c in &counts {
                    println!("{}\t{}", c.name, c.count);
                }
            }
        }
        Command::Topic { action } => match action {
            TopicAction::Add { words } => topic_add(&config_db, words)?,
            TopicAction::Remove { name } => {
                if !config_db.remove_topic(&name)? {
                    return Err(Error::NotFound {
                        kind: "topic",
                        name,
                    });
                }
                println!("Removed topic '{name}'");
            }
            TopicAction::List { json } => topic_list(&config_db, json)?,
        },
        Command::Vote(args) => {
            let store = EventStore::open(&data_dir)?;
            let score = vote::vote(&store, &args.id, args.direction)?;
            println!("{}\t{score:+}", args.id);
        }
        Command::Show(args) => {
            let store = EventStore::open(&data_dir)?;
            let event = store.get(&args.id)?.ok_or_else(|| Error::NotFound {
                kind: "event",
                name: args.id.clone(),
            })?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&event)?);
            } else {
                print_event(&event);
            }
        }
        Command::Config { action } => match action {
            ConfigAction::Show { json } => config_show(&config_db, json)?,
            ConfigAction::Set { key, value } => {
                Settings::validate(&key, &value)?;
                config_db.set_setting(&key, &value)?;
                println!("Set {key} = {value}");
            }
            ConfigAction::Clear { key } => {
                if !config_db.remove_setting(&key)? {
                    return Err(Error::NotFound {
                        kind: "setting",
                        name: key,
                    });
                }
                println!("Cleared {key}");
            }
        },
        Command::Status(args) => cmd_status(&config_db, &data_dir, args.json)?,
        Command::Reindex => {
            let store = EventStore::open(&data_dir)?;
            let count = store.reindex()?;
            println!("Reindexed {count} event(s)");
        }
        Command::Completions(_) => {}
    }

    Ok(())
}

fn print_report(report: &IngestReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(report)?);
    } else {
        println!(
            "Imported {} event(s), {} duplicate(s), {} skipped",
            report.inserted, report.duplicates, report.skipped
        );
    }
    Ok(())
}

fn print_event(event: &Event) {
    println!("id: {}", event.id);
    println!("datetime: {}", event.datetime.format("%Y/%m/%d %H:%M:%S"));
    println!("title: {}", event.title);
    println!("uri: {}", event.uri);
    println!("organizer: {}", event.organizer.as_deref().unwrap_or("-"));
    println!("group: {}", event.group.as_deref().unwrap_or("-"));
    println!("venue: {}", event.venue);
    println!("score: {:+}", event.score);
    println!("summary:\n{}", event.summary);
    println!("note:\n{}", event.note);
}

fn topic_add(config_db: &ConfigDb, words: Vec<String>) -> Result<()> {
    let words: Vec<String> = words
        .iter()
        .flat_map(|w| text_util::split_keywords(w))
        .collect();
    let topic = Topic::from_words(words).ok_or_else(|| {
        Error::Config("a topic needs at least one word".to_string())
    })?;

    config_db.set_topic(&topic.name, &topic.words)?;
    println!("Saved topic '{}' ({} word(s))", topic.name, topic.words.len());
    Ok(())
}

fn topic_list(config_db: &ConfigDb, json: bool) -> Result<()> {
    let topics = period::load_topics(config_db)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&topics)?);
    } else if topics.is_empty() {
        println!("No topics defined.");
    } else {
        for topic in &topics {
            println!("{}\t{}", topic.name, topic.words.join(" "));
        }
    }
    Ok(())
}

fn config_show(config_db: &ConfigDb, json: bool) -> Result<()> {
    let entries = Settings::load(config_db)?.entries();

    if json {
        let map: serde_json::Map<String, serde_json::Value> = entries
            .into_iter()
            .map(|(k, v)| (k, serde_json::Value::String(v)))
            .collect();
        println!("{}", serde_json::to_string_pretty(&map)?);
    } else {
        for (key, value) in &entries {
            println!("{key} = {value}");
        }
    }
    Ok(())
}

fn cmd_status(config_db: &ConfigDb, data_dir: &DataDir, json: bool) -> Result<()> {
    let settings = Settings::load(config_db)?;
    let store = EventStore::open(data_dir)?;
    let events = store.len()?;
    let indexed = store.indexed_len()?;
    let topics = config_db.list_topics()?.len();

    let inbox_dir = match settings.inbox_dir.clone() {
        Some(dir) => dir,
        None => data_dir.inbox_dir()?,
    };
    let pending = inbox::discover_exports(&inbox_dir)?.len();

    if json {
        let value = serde_json::json!({
            "data_dir": data_dir.root().display().to_string(),
            "events": events,
            "indexed": indexed,
            "topics": topics,
            "inbox_dir": inbox_dir.display().to_string(),
            "pending_exports": pending,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("Data directory: {}", data_dir.root().display());
        println!("Events: {events}");
        println!("Indexed: {indexed}");
        if indexed != events {
            println!("  (index out of date, run `rireki reindex`)");
        }
        println!("Topics: {topics}");
        println!("Inbox: {} ({pending} pending)", inbox_dir.display());
    }
    Ok(())
}
