use anyhow::Context;
use clap::{Parser, Subcommand};
use interactive_cache::{
    config::Config, CounterKey, CounterRecord, DeltaOutcome, InteractiveCache,
    RedisInteractiveCache,
};
use tracing_subscriber::EnvFilter;

/// Inspect and adjust cached interactive counters.
#[derive(Parser, Debug)]
#[command(name = "counterctl", version)]
struct Cli {
    /// Redis address, overrides the config file and `REDIS_ADDR`.
    #[arg(long)]
    redis: Option<String>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the cached counters as JSON, or `miss`.
    Get { biz: String, id: i64 },
    /// Replace all counters and re-arm the TTL.
    Set {
        biz: String,
        id: i64,
        #[arg(long, default_value_t = 0)]
        read: i64,
        #[arg(long, default_value_t = 0)]
        like: i64,
        #[arg(long, default_value_t = 0)]
        collect: i64,
    },
    IncrRead { biz: String, id: i64 },
    IncrLike { biz: String, id: i64 },
    DecrLike { biz: String, id: i64 },
    IncrCollect { biz: String, id: i64 },
    /// Drop the cached counters.
    Evict { biz: String, id: i64 },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let Cli { redis, cmd } = Cli::parse();
    let mut config = Config::load()?;
    if let Some(addr) = redis {
        config.redis_addr = addr;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_lowercase()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let client = redis::Client::open(config.redis_addr.as_str())
        .with_context(|| format!("invalid redis address `{}`", config.redis_addr))?;
    let cache = RedisInteractiveCache::connect(client, config.cache_options()?)
        .await
        .with_context(|| format!("fail to connect to {}", config.redis_addr))?;

    run(&cache, cmd).await
}

async fn run(cache: &impl InteractiveCache, cmd: Command) -> anyhow::Result<()> {
    let outcome = match cmd {
        Command::Get { biz, id } => {
            match cache.get(&CounterKey::new(biz, id)).await? {
                Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
                None => println!("miss"),
            }
            return Ok(());
        }
        Command::Set {
            biz,
            id,
            read,
            like,
            collect,
        } => {
            let record = CounterRecord {
                biz_id: id,
                read_cnt: read,
                like_cnt: like,
                collect_cnt: collect,
            };
            cache.set(&CounterKey::new(biz, id), &record).await?;
            println!("ok");
            return Ok(());
        }
        Command::Evict { biz, id } => {
            let removed = cache.evict(&CounterKey::new(biz, id)).await?;
            println!("{}", if removed { "evicted" } else { "miss" });
            return Ok(());
        }
        Command::IncrRead { biz, id } => {
            cache
                .incr_read_cnt_if_present(&CounterKey::new(biz, id))
                .await?
        }
        Command::IncrLike { biz, id } => {
            cache
                .incr_like_cnt_if_present(&CounterKey::new(biz, id))
                .await?
        }
        Command::DecrLike { biz, id } => {
            cache
                .decr_like_cnt_if_present(&CounterKey::new(biz, id))
                .await?
        }
        Command::IncrCollect { biz, id } => {
            cache
                .incr_collect_cnt_if_present(&CounterKey::new(biz, id))
                .await?
        }
    };

    match outcome {
        DeltaOutcome::Applied => println!("applied"),
        DeltaOutcome::Skipped => println!("skipped"),
    }
    Ok(())
}
