//! EdgeKV CLI Client
//!
//! Command-line interface for S3X key-value object stores.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use edgekv::{
    ClientConfig, EdgeError, EdgexClient, KvClient, ListFormat, ListQuery, MemoryStore,
    ObjectOptions, ObjectType, Result, StoreConfig,
};
use tracing_subscriber::{fmt, EnvFilter};

/// EdgeKV CLI
#[derive(Parser, Debug)]
#[command(name = "edgekv-cli")]
#[command(about = "CLI for S3X key-value object stores")]
#[command(version)]
struct Args {
    /// S3X endpoint (scheme, host and port default to http, localhost, 3000)
    #[arg(short, long, default_value = edgekv::config::DEFAULT_ENDPOINT)]
    endpoint: String,

    /// S3 authentication key
    #[arg(long, default_value = "")]
    auth_key: String,

    /// S3 authentication secret
    #[arg(long, default_value = "")]
    secret: String,

    /// Request timeout in milliseconds
    #[arg(long, default_value = "45000")]
    timeout_ms: u64,

    /// Serve requests from a local store instead of the endpoint
    #[arg(long)]
    mock: bool,

    /// Snapshot file of the local store used with --mock
    #[arg(long, default_value = "./edgekv_state.bin")]
    state: PathBuf,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Bucket operations
    #[command(subcommand)]
    Bucket(BucketCommand),

    /// Object operations
    #[command(subcommand)]
    Object(ObjectCommand),

    /// Key-value operations
    #[command(subcommand)]
    Kv(KvCommand),
}

#[derive(Subcommand, Debug)]
enum BucketCommand {
    /// Create a bucket
    Create { bucket: String },

    /// Delete a bucket and its objects
    Delete { bucket: String },

    /// Check that a bucket exists
    Head { bucket: String },

    /// List all buckets
    List,
}

#[derive(Subcommand, Debug)]
enum ObjectCommand {
    /// Create an object
    Create {
        bucket: String,
        object: String,

        /// Object kind
        #[arg(long, value_enum, default_value = "kv")]
        kind: Kind,

        /// Chunk size for the object's chunk map
        #[arg(long, default_value_t = edgekv::types::DEFAULT_CHUNK_SIZE)]
        chunk_size: u32,

        /// Btree order of the object's chunk map
        #[arg(long, default_value_t = edgekv::types::DEFAULT_BTREE_ORDER)]
        btree_order: u32,
    },

    /// Delete an object
    Delete { bucket: String, object: String },

    /// Check that an object exists
    Head { bucket: String, object: String },

    /// List objects of a bucket
    List {
        bucket: String,

        #[command(flatten)]
        window: Window,
    },
}

#[derive(Subcommand, Debug)]
enum KvCommand {
    /// Read a committed value
    Get {
        bucket: String,
        object: String,
        key: String,
    },

    /// Write key=value pairs in one transaction
    Put {
        bucket: String,
        object: String,

        /// Pairs as key=value
        #[arg(required = true)]
        pairs: Vec<String>,

        /// Stage the pairs, then discard them instead of committing
        #[arg(long)]
        rollback: bool,
    },

    /// Delete keys in one transaction
    Del {
        bucket: String,
        object: String,

        #[arg(required = true)]
        keys: Vec<String>,

        /// Stage the deletions, then discard them instead of committing
        #[arg(long)]
        rollback: bool,
    },

    /// List committed keys
    List {
        bucket: String,
        object: String,

        #[command(flatten)]
        window: Window,

        /// Emit `key;value` lines instead of JSON
        #[arg(long)]
        csv: bool,

        /// Keys only
        #[arg(long)]
        keys_only: bool,
    },

    /// Upsert the pairs of a JSON object
    PostJson {
        bucket: String,
        object: String,
        json: String,
    },

    /// Upsert `key;value` lines
    PostCsv {
        bucket: String,
        object: String,
        csv: String,
    },

    /// Delete the keys of a JSON object or array
    DelJson {
        bucket: String,
        object: String,
        json: String,
    },
}

#[derive(ClapArgs, Debug)]
struct Window {
    /// First key (inclusive)
    #[arg(long, default_value = "")]
    from: String,

    /// Key prefix
    #[arg(long, default_value = "")]
    prefix: String,

    /// Maximum entries, 0 for all
    #[arg(long, default_value = "0")]
    max: usize,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Kind {
    Kv,
    Object,
}

fn main() {
    let args = Args::parse();

    let default_filter = if args.verbose { "info,edgekv=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    fmt().with_env_filter(filter).with_target(true).init();

    if let Err(e) = run(args) {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let client = if args.mock {
        let config = StoreConfig::builder().snapshot_path(&args.state).build();
        tracing::debug!("Using local store at {}", args.state.display());
        EdgexClient::loopback(Arc::new(MemoryStore::open(config)?))
    } else {
        let config = ClientConfig::builder()
            .endpoint(&args.endpoint)
            .timeout_ms(args.timeout_ms)
            .credentials(&args.auth_key, &args.secret)
            .build();
        EdgexClient::new(config)?
    };

    match args.command {
        Commands::Bucket(command) => bucket(&client, command),
        Commands::Object(command) => object(&client, command),
        Commands::Kv(command) => kv(&client, command),
    }
}

fn bucket(client: &EdgexClient, command: BucketCommand) -> Result<()> {
    match command {
        BucketCommand::Create { bucket } => client.bucket_create(&bucket),
        BucketCommand::Delete { bucket } => client.bucket_delete(&bucket),
        BucketCommand::Head { bucket } => {
            if client.bucket_exists(&bucket)? {
                println!("{} exists", bucket);
                Ok(())
            } else {
                Err(EdgeError::BucketNotFound(bucket))
            }
        }
        BucketCommand::List => {
            for bucket in client.bucket_list()? {
                println!("{}\t{}", bucket.name, bucket.creation_date);
            }
            Ok(())
        }
    }
}

fn object(client: &EdgexClient, command: ObjectCommand) -> Result<()> {
    match command {
        ObjectCommand::Create {
            bucket,
            object,
            kind,
            chunk_size,
            btree_order,
        } => {
            let options = ObjectOptions {
                object_type: match kind {
                    Kind::Kv => ObjectType::KeyValue,
                    Kind::Object => ObjectType::Object,
                },
                chunk_size,
                btree_order,
                ..client.object_options().clone()
            };
            client.object_create(&bucket, &object, &options)
        }
        ObjectCommand::Delete { bucket, object } => client.object_delete(&bucket, &object),
        ObjectCommand::Head { bucket, object } => {
            if client.object_exists(&bucket, &object)? {
                println!("{}/{} exists", bucket, object);
                Ok(())
            } else {
                Err(EdgeError::ObjectNotFound(format!("{}/{}", bucket, object)))
            }
        }
        ObjectCommand::List { bucket, window } => {
            let objects = client.object_list(&bucket, &window.from, &window.prefix, window.max)?;
            for entry in objects {
                println!("{}\t{}\t{}", entry.key, entry.size, entry.last_modified);
            }
            Ok(())
        }
    }
}

fn parse_pair(pair: &str) -> Result<(&str, &str)> {
    pair.split_once('=')
        .filter(|(key, _)| !key.is_empty())
        .ok_or_else(|| EdgeError::InvalidArgument(format!("Expected key=value, got `{}`", pair)))
}

fn kv(client: &EdgexClient, command: KvCommand) -> Result<()> {
    match command {
        KvCommand::Get { bucket, object, key } => {
            println!("{}", client.kv_get(&bucket, &object, &key)?);
            Ok(())
        }
        KvCommand::Put {
            bucket,
            object,
            pairs,
            rollback,
        } => {
            let pairs = pairs.iter().map(|pair| parse_pair(pair)).collect::<Result<Vec<_>>>()?;
            let mut session = client.open_session(&bucket, &object)?;

            if let [(key, value)] = pairs.as_slice() {
                if !rollback {
                    return client.kv_post(&mut session, key, value, false);
                }
            }
            for (key, value) in &pairs {
                client.kv_post(&mut session, key, value, true)?;
            }
            finish(client, session, rollback)
        }
        KvCommand::Del {
            bucket,
            object,
            keys,
            rollback,
        } => {
            let mut session = client.open_session(&bucket, &object)?;

            if let [key] = keys.as_slice() {
                if !rollback {
                    return client.kv_delete(&mut session, key, false);
                }
            }
            for key in &keys {
                client.kv_delete(&mut session, key, true)?;
            }
            finish(client, session, rollback)
        }
        KvCommand::List {
            bucket,
            object,
            window,
            csv,
            keys_only,
        } => {
            let query = ListQuery::new()
                .from_key(window.from)
                .prefix(window.prefix)
                .max_count(window.max)
                .format(if csv { ListFormat::Csv } else { ListFormat::Json })
                .include_values(!keys_only);
            println!("{}", client.kv_list(&bucket, &object, &query)?);
            Ok(())
        }
        KvCommand::PostJson { bucket, object, json } => {
            let mut session = client.open_session(&bucket, &object)?;
            client.kv_post_json(&mut session, &json, false)
        }
        KvCommand::PostCsv { bucket, object, csv } => {
            let mut session = client.open_session(&bucket, &object)?;
            client.kv_post_csv(&mut session, &csv, false)
        }
        KvCommand::DelJson { bucket, object, json } => {
            let mut session = client.open_session(&bucket, &object)?;
            client.kv_delete_json(&mut session, &json, false)
        }
    }
}

/// Commit or roll back a staged transaction, then close the session
fn finish(client: &EdgexClient, mut session: edgekv::Session, rollback: bool) -> Result<()> {
    if rollback {
        client.kv_rollback(&mut session)?;
        tracing::info!("Rolled back {}", session.path());
    } else {
        client.kv_commit(&mut session)?;
        tracing::debug!("Committed {}", session.path());
    }
    client.close(session)
}
