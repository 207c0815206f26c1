//! Coupling Flow CLI
//!
//! Inspect partition masks and check affine coupling round trips

use anyhow::Result;
use clap::{Parser, Subcommand};
use ndarray::{ArrayD, IxDyn};
use ndarray_rand::rand::rngs::StdRng;
use ndarray_rand::rand::SeedableRng;
use ndarray_rand::rand_distr::StandardNormal;
use ndarray_rand::RandomExt;
use std::path::PathBuf;
use tracing::{info, warn};

use coupling_flow::flow::{
    channel_wise_mask, checkerboard_mask, AffineCouplingBuilder, MaskType, Mlp, ScaleTranslateMlp,
};
use coupling_flow::{CouplingConfig, VERSION};

#[derive(Parser)]
#[command(name = "coupling-flow")]
#[command(about = "Affine coupling layers for normalizing flows", version = VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a partition mask
    Mask {
        /// Mask type: checkerboard or channel_wise
        #[arg(short, long, default_value = "checkerboard")]
        kind: String,

        /// Grid height (checkerboard)
        #[arg(long, default_value = "5")]
        height: usize,

        /// Grid width (checkerboard)
        #[arg(long, default_value = "4")]
        width: usize,

        /// Channel count (channel_wise)
        #[arg(short, long, default_value = "6")]
        channels: usize,

        /// Flip the mask parity
        #[arg(short, long)]
        inverse: bool,
    },

    /// Run forward and inverse on random input and report the error
    Roundtrip {
        /// Layer config file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Batch size
        #[arg(short, long, default_value = "4")]
        batch: usize,

        /// Per-sample shape, e.g. 4,8,8 or 6
        #[arg(short, long, value_delimiter = ',')]
        shape: Option<Vec<usize>>,

        /// RNG seed for weights and input
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Use separate scale and translation networks
        #[arg(long)]
        separate: bool,
    },

    /// Write the default layer config
    InitConfig {
        /// Output path
        #[arg(default_value = "coupling.json")]
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Mask {
            kind,
            height,
            width,
            channels,
            inverse,
        } => print_mask(kind.parse()?, height, width, channels, inverse),
        Commands::Roundtrip {
            config,
            batch,
            shape,
            seed,
            separate,
        } => roundtrip(config, batch, shape, seed, separate)?,
        Commands::InitConfig { path } => {
            CouplingConfig::default().save(&path)?;
            info!("Wrote default config to {}", path.display());
        }
    }

    Ok(())
}

fn print_mask(kind: MaskType, height: usize, width: usize, channels: usize, inverse: bool) {
    match kind {
        MaskType::Checkerboard => {
            let mask = checkerboard_mask(height, width, inverse);
            println!("checkerboard {}x{} (inverse={}):", height, width, inverse);
            for row in mask.rows() {
                let cells: Vec<String> = row.iter().map(|v| format!("{}", *v as u8)).collect();
                println!("  {}", cells.join(" "));
            }
        }
        MaskType::ChannelWise => {
            let mask = channel_wise_mask(channels, inverse);
            let cells: Vec<String> = mask.iter().map(|v| format!("{}", *v as u8)).collect();
            println!("channel_wise {} (inverse={}): [{}]", channels, inverse, cells.join(", "));
        }
    }
}

fn roundtrip(
    config_path: Option<PathBuf>,
    batch: usize,
    shape: Option<Vec<usize>>,
    seed: u64,
    separate: bool,
) -> Result<()> {
    let mut config = match config_path {
        Some(path) => CouplingConfig::load(&path)?,
        None => CouplingConfig::default(),
    };

    let sample_shape = shape.unwrap_or_else(|| vec![config.in_channels]);
    if let Some(&channels) = sample_shape.first() {
        if channels != config.in_channels {
            warn!(
                "Sample shape overrides in_channels: {} -> {}",
                config.in_channels, channels
            );
            config.in_channels = channels;
        }
    }
    config.validate()?;

    let sample_dim: usize = sample_shape.iter().product();
    let mut full_shape = vec![batch];
    full_shape.extend(&sample_shape);

    let mut rng = StdRng::seed_from_u64(seed);
    let builder = AffineCouplingBuilder::from_config(&config);
    let layer = if separate {
        let scale = Mlp::with_rng(sample_dim, config.hidden_dim, sample_dim, config.num_hidden, &mut rng);
        let translate =
            Mlp::with_rng(sample_dim, config.hidden_dim, sample_dim, config.num_hidden, &mut rng);
        info!(
            "Separate networks with {} parameters",
            scale.num_parameters() + translate.num_parameters()
        );
        builder.scale_net(scale).translate_net(translate).build()?
    } else {
        let net = ScaleTranslateMlp::from_config(&config, sample_dim, 0, &mut rng);
        info!("Joint network with {} parameters", net.num_parameters());
        builder.scale_translate_net(net).build()?
    };
    info!("Layer: {}", layer);

    let x = ArrayD::<f64>::random_using(IxDyn(&full_shape), StandardNormal, &mut rng);
    let out = layer.forward(&x, None, true)?;
    let x_rec = layer.inverse(&out.output, None)?;

    let max_err = x
        .iter()
        .zip(x_rec.iter())
        .map(|(a, b)| (a - b).abs())
        .fold(0.0_f64, f64::max);

    println!("Input shape: {:?}", x.shape());
    println!("Max reconstruction error: {:.3e}", max_err);
    if let Some(log_det) = out.log_det {
        for (i, ld) in log_det.iter().enumerate() {
            println!("  sample {:>3}: log|det J| = {:+.6}", i, ld);
        }
    }

    Ok(())
}
