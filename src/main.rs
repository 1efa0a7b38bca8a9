use clap::{Parser, Subcommand};
use imagemill::ops::Operation;
use imagemill::{config, ops, pipeline, request, response, storage, types};
use serde_json::{Map, Value};
use std::path::PathBuf;

/// Shared flags for commands that address one source object.
#[derive(clap::Args, Clone)]
struct ObjectArgs {
    /// Bucket the source object lives in
    #[arg(long)]
    bucket: String,

    /// Source object name (png, jpg, or jpeg)
    #[arg(long)]
    file: String,

    /// Include an expiring download URL in the response
    #[arg(long)]
    download: bool,
}

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup — trivial, called exactly once
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "imagemill")]
#[command(about = "Image processing over bucket storage")]
#[command(long_about = "\
Image processing over bucket storage

Buckets are directories under the configured storage root; objects are
image files inside them. Every command answers with one JSON object and
exits 1 when that object is an error.

Single operations:

  imagemill rotate --bucket photos --file cat.png --angle 90
  imagemill resize --bucket photos --file cat.png --width 200 --height 100
  imagemill convert --bucket photos --file cat.png --format jpeg --download

Chained operations run from a request file (or stdin with '-'):

  {
    \"bucketname\": \"photos\",
    \"filename\": \"cat.png\",
    \"operations\": [
      [\"rotate\", {\"rotation_angle\": 90}],
      [\"grayscale\", {}],
      [\"transform\", {\"target_format\": \"jpeg\"}]
    ],
    \"get_download\": true
  }

The source is fetched once, the image is threaded through the steps in
order, and a single batch_ artifact is written at the end. Each step
leaves one record in operation_outputs; a bad step is recorded and the
chain continues.

Run 'imagemill gen-config' to generate a documented imagemill.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Directory searched for imagemill.toml (defaults apply if absent)
    #[arg(long, default_value = ".", global = true)]
    config_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Execute a chained-operation request from a JSON file ('-' = stdin)
    Run {
        /// Request file path
        #[arg(long, default_value = "-")]
        request: String,
    },
    /// Report dimensions, color mode, and transparency of an object
    Inspect(ObjectArgs),
    /// Rotate clockwise by a quarter turn
    Rotate {
        #[command(flatten)]
        object: ObjectArgs,

        /// Rotation angle: 90, 180, or 270
        #[arg(long)]
        angle: i64,
    },
    /// Resize to exact dimensions
    Resize {
        #[command(flatten)]
        object: ObjectArgs,

        /// Target width in pixels
        #[arg(long)]
        width: i64,

        /// Target height in pixels
        #[arg(long)]
        height: i64,
    },
    /// Convert to a single 8-bit gray channel
    Grayscale(ObjectArgs),
    /// Adjust brightness linearly
    Brightness {
        #[command(flatten)]
        object: ObjectArgs,

        /// Delta in 1..=100; 50 leaves the image unchanged
        #[arg(long)]
        delta: i64,
    },
    /// Re-encode as jpeg or png
    Convert {
        #[command(flatten)]
        object: ObjectArgs,

        /// Target format (jpeg or png); configured default when omitted
        #[arg(long)]
        format: Option<String>,
    },
    /// Print a stock imagemill.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A CLI process serves exactly one request, so every invocation is a
    // cold start and the runtime clock starts here.
    let context = types::InvocationContext::new(true);
    let cli = Cli::parse();

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let config = config::load_config(&cli.config_dir)?;
    let store = storage::DirStore::from_config(&config.storage);

    let body = match cli.command {
        Command::GenConfig => unreachable!("returned above"),
        Command::Run { request } => {
            let raw = read_request(&request)?;
            let value: Value = serde_json::from_str(&raw)?;
            match pipeline::run_pipeline(&store, &value, &config) {
                Ok(report) => response::pipeline_success(&report),
                Err(err) => response::error_object(&err.to_string()),
            }
        }
        Command::Inspect(object) => {
            standalone(Operation::Details, &store, &object, Map::new(), &config)
        }
        Command::Rotate { object, angle } => {
            let mut args = Map::new();
            args.insert("rotation_angle".to_string(), angle.into());
            standalone(Operation::Rotate, &store, &object, args, &config)
        }
        Command::Resize {
            object,
            width,
            height,
        } => {
            let mut args = Map::new();
            args.insert("target_width".to_string(), width.into());
            args.insert("target_height".to_string(), height.into());
            standalone(Operation::Resize, &store, &object, args, &config)
        }
        Command::Grayscale(object) => {
            standalone(Operation::Grayscale, &store, &object, Map::new(), &config)
        }
        Command::Brightness { object, delta } => {
            let mut args = Map::new();
            args.insert("brightness_delta".to_string(), delta.into());
            standalone(Operation::Brightness, &store, &object, args, &config)
        }
        Command::Convert { object, format } => {
            let mut args = Map::new();
            if let Some(format) = format {
                args.insert("target_format".to_string(), format.into());
            }
            standalone(Operation::Transform, &store, &object, args, &config)
        }
    };

    let sealed = response::with_runtime_metrics(body, &context);
    println!("{}", serde_json::to_string_pretty(&sealed)?);
    if sealed.get("error").is_some() {
        std::process::exit(1);
    }
    Ok(())
}

/// Build the flat request map a standalone operation expects and run it.
fn standalone(
    operation: Operation,
    store: &storage::DirStore,
    object: &ObjectArgs,
    mut args: Map<String, Value>,
    config: &config::AppConfig,
) -> Map<String, Value> {
    args.insert(
        request::BUCKET_KEY.to_string(),
        object.bucket.clone().into(),
    );
    args.insert(
        request::FILE_NAME_KEY.to_string(),
        object.file.clone().into(),
    );
    if object.download {
        args.insert(request::GET_DOWNLOAD_KEY.to_string(), true.into());
    }
    ops::run_standalone(operation, store, &args, config)
}

fn read_request(source: &str) -> Result<String, std::io::Error> {
    if source == "-" {
        let mut buffer = String::new();
        std::io::Read::read_to_string(&mut std::io::stdin(), &mut buffer)?;
        Ok(buffer)
    } else {
        std::fs::read_to_string(source)
    }
}
