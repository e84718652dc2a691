use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::num::NonZeroU32;
use std::path::PathBuf;

use structopt::StructOpt;
use waste_serve::ClassifierOptions;

#[derive(StructOpt, Debug)]
#[structopt(
    name = "waste-http",
    about = "HTTP service classifying photos of waste with a pretrained model"
)]
struct Args {
    #[structopt(long, env = "ML_SERVICE_HOST", default_value = "0.0.0.0")]
    host: String,

    #[structopt(long, env = "ML_SERVICE_PORT", default_value = "5000")]
    port: u16,

    #[structopt(
        long,
        env = "ML_SERVICE_DEBUG",
        default_value = "False",
        help = "`true` enables debug logging"
    )]
    debug: String,

    #[structopt(
        long,
        env = "CORS_ORIGINS",
        default_value = "http://localhost:3000,http://localhost:3001",
        help = "Comma separated origins allowed to call the API, `*` for any"
    )]
    cors_origins: String,

    #[structopt(
        long,
        env = "MAX_CONTENT_LENGTH",
        default_value = "16777216",
        help = "Largest accepted request body in bytes"
    )]
    max_content_length: usize,

    #[structopt(
        long,
        env = "TARGET_IMAGE_SIZE",
        default_value = "224",
        help = "Edge of the square model input"
    )]
    target_image_size: NonZeroU32,

    #[structopt(long, env = "LOG_LEVEL", default_value = "INFO")]
    log_level: String,

    #[structopt(
        long,
        env = "MODEL_PATH",
        default_value = "models/waste_model",
        parse(from_os_str),
        help = "TensorFlow SavedModel export directory"
    )]
    model_path: PathBuf,

    #[structopt(
        long,
        env = "CLASS_NAMES_PATH",
        parse(from_os_str),
        help = "JSON list of class names [default: <model_path>/class_names.json]"
    )]
    class_names_path: Option<PathBuf>,
}

/// Service settings, read once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub debug: bool,
    pub cors_origins: Vec<String>,
    pub max_content_length: usize,
    pub target_image_size: u32,
    pub log_level: String,
    pub model_path: PathBuf,
    pub class_names_path: Option<PathBuf>,
}

impl From<Args> for Settings {
    fn from(args: Args) -> Self {
        Settings {
            host: args.host,
            port: args.port,
            debug: args.debug.trim().eq_ignore_ascii_case("true"),
            cors_origins: args
                .cors_origins
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_owned)
                .collect(),
            max_content_length: args.max_content_length,
            target_image_size: args.target_image_size.get(),
            log_level: args.log_level,
            model_path: args.model_path,
            class_names_path: args.class_names_path,
        }
    }
}

impl Settings {
    /// Read the command line and the process environment.
    pub fn from_args() -> Self {
        Args::from_args().into()
    }

    /// Parse an explicit argument list; the environment still fills gaps.
    pub fn from_args_iter<I>(iter: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<std::ffi::OsString> + Clone,
    {
        Args::from_iter(iter).into()
    }

    /// `env_logger` filter: `debug` in debug mode, otherwise `LOG_LEVEL`
    /// with Python level names translated.
    pub fn log_filter(&self) -> String {
        if self.debug {
            return "debug".to_owned();
        }

        match self.log_level.trim().to_ascii_lowercase().as_str() {
            "warning" => "warn".to_owned(),
            "critical" | "fatal" => "error".to_owned(),
            "notset" => "trace".to_owned(),
            level => level.to_owned(),
        }
    }

    pub fn allows_any_origin(&self) -> bool {
        self.cors_origins.iter().any(|allowed| allowed == "*")
    }

    pub fn bind_addr(&self) -> io::Result<SocketAddr> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::AddrNotAvailable,
                    format!("{} did not resolve to an address", self.host),
                )
            })
    }

    pub fn classifier_options(&self) -> ClassifierOptions {
        ClassifierOptions {
            target_size: (self.target_image_size, self.target_image_size),
            class_names_path: self.class_names_path.clone(),
        }
    }
}
