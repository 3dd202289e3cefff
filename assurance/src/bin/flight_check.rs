use std::path::PathBuf;
use std::time::Duration;

use assurance::geo::route_bounds;
use assurance::gpx_export::encode_plan_as_gpx;
use assurance::oracle::{AnyOracle, ConstantOracle, DemOracle, HttpElevationOracle};
use assurance::{
    analyze_terrain, annotate_distances, parse_flight_plan, resolve_terrain, AnalysisConfig,
    CancellationFlag,
};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Parse a flight plan and check its terrain clearance"
)]
struct Args {
    /// Flight plan file (.waypoints, .geojson, .kml or .kmz)
    input: PathBuf,

    /// ESRI ASCII grid used as the elevation source
    #[arg(long)]
    dem: Option<PathBuf>,

    /// Open-Meteo compatible elevation endpoint
    #[arg(long)]
    elevation_api: Option<String>,

    /// Flat ground at this elevation, for dry runs
    #[arg(long)]
    constant_ground: Option<f64>,

    /// Sampling interval in meters
    #[arg(long)]
    interval: Option<f64>,

    #[arg(long)]
    concurrency: Option<usize>,

    /// Pause before each elevation query, in milliseconds
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Also sample the exact end of the route
    #[arg(long)]
    include_endpoint: bool,

    /// Rewrite relative and terrain altitudes to absolute before analysis
    #[arg(long)]
    resolve_terrain: bool,

    /// Write the route as GPX to this path
    #[arg(long)]
    gpx: Option<PathBuf>,

    #[arg(long)]
    pretty: bool,
}

impl Args {
    fn apply(&self, config: &mut AnalysisConfig) {
        if let Some(dem) = &self.dem {
            config.dem_path = Some(dem.clone());
        }
        if let Some(url) = &self.elevation_api {
            config.elevation_api_url = Some(url.clone());
        }
        if let Some(interval) = self.interval {
            config.sampling.interval_m = interval;
        }
        if let Some(concurrency) = self.concurrency {
            config.sampling.concurrency = concurrency;
        }
        if let Some(delay) = self.delay_ms {
            config.sampling.query_delay = Duration::from_millis(delay);
        }
        if self.include_endpoint {
            config.sampling.include_endpoint = true;
        }
    }

    fn oracle(&self, config: &AnalysisConfig) -> Option<AnyOracle> {
        if let Some(ground) = self.constant_ground {
            return Some(AnyOracle::Constant(ConstantOracle::new(ground)));
        }
        if let Some(path) = &config.dem_path {
            return Some(AnyOracle::Dem(DemOracle::lazy(path)));
        }
        config
            .elevation_api_url
            .as_ref()
            .map(|url| AnyOracle::Http(HttpElevationOracle::new(url.as_str())))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "assurance=info,flight_check=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let mut config = AnalysisConfig::from_env()?;
    args.apply(&mut config);
    config.validate()?;

    let file_name = args
        .input
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default()
        .to_string();
    let bytes = tokio::fs::read(&args.input).await?;
    tracing::info!("read {} ({} bytes)", args.input.display(), bytes.len());

    let plan = parse_flight_plan(&file_name, &bytes)?;
    let stage = annotate_distances(plan);

    let cancel = CancellationFlag::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling terrain analysis");
            on_interrupt.cancel();
        }
    });

    let (plan, terrain) = match args.oracle(&config) {
        Some(oracle) => {
            let plan = if args.resolve_terrain {
                resolve_terrain(stage, &oracle).await?.into_inner()
            } else {
                stage.into_inner()
            };
            let terrain = analyze_terrain(&plan, &oracle, &config.sampling, &cancel).await?;
            (plan, Some(terrain))
        }
        None => {
            tracing::info!("no elevation source configured, skipping terrain analysis");
            (stage.into_inner(), None)
        }
    };

    if let Some(path) = &args.gpx {
        let name = args
            .input
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("flight plan");
        tokio::fs::write(path, encode_plan_as_gpx(&plan, name)?).await?;
        tracing::info!("wrote GPX route to {}", path.display());
    }

    let bounds = route_bounds(plan.coordinates()).map(|bounds| {
        serde_json::json!({ "box": bounds, "areaM2": bounds.area_m2() })
    });
    let report = serde_json::json!({ "plan": plan, "bounds": bounds, "terrain": terrain });
    let output = if args.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{output}");

    Ok(())
}
