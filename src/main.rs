use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use cnnfi_analysis::{
    format_campaign_report, CampaignAnalyzer, CampaignClassifier, CampaignResponse,
    MetricsComparator,
};
use cnnfi_manifest::{Manifest, MANIFEST_FILE};
use cnnfi_spec::{
    classify_ieee754_bit, describe_mask, format_mask, to_hardware_bit, ActivationCampaignRequest,
    ActivationFaultRequest, BitNumbering, BitPreset, BitWidth, FaultSpec, HardwareFaultPlan,
    LayerFaults, WeightCampaignRequest, WeightFaultRequest,
};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// cnnfi - CNN fault injection specification and campaign analysis
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Project manifest (defaults to ./cnnfi.toml, then built-in LeNet-5)
    #[arg(short, long, global = true)]
    manifest: Option<PathBuf>,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default cnnfi.toml
    Init {
        /// Destination file
        #[arg(short, long, default_value = MANIFEST_FILE)]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Describe a bit index
    Bits {
        /// LSB-first bit index
        index: i64,

        /// Value width in bits (8, 16 or 32)
        #[arg(short, long, default_value = "32")]
        width: u32,
    },

    /// List bit selection presets
    Presets,

    /// Validate a fault request file
    Validate {
        /// Fault request or campaign request (JSON)
        request: PathBuf,

        /// Fault domain: activation or weight
        #[arg(short, long, default_value = "activation")]
        domain: String,

        /// Write the normalized request here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Build a hardware fault request
    Hardware {
        /// Filter and bias fault entries (JSON)
        faults: PathBuf,

        /// Numbering of bit positions in the input: lsb or msb
        #[arg(short, long, default_value = "lsb")]
        numbering: String,

        /// Write the request here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Analyze a campaign response
    Analyze {
        /// Campaign response (JSON)
        response: PathBuf,

        /// Emit JSON instead of a text report
        #[arg(long)]
        json: bool,

        /// Fail if the inference engine reported a numeric fault
        #[arg(long)]
        strict: bool,

        /// Write the output here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Init { path, force } => {
            init_manifest(&path, force)?;
        }

        Commands::Bits { index, width } => {
            describe_bit(index, width)?;
        }

        Commands::Presets => {
            list_presets();
        }

        Commands::Validate {
            request,
            domain,
            output,
        } => {
            let manifest = load_manifest(cli.manifest.as_deref())?;
            validate_request(&manifest, &request, &domain, output.as_deref())?;
        }

        Commands::Hardware {
            faults,
            numbering,
            output,
        } => {
            let manifest = load_manifest(cli.manifest.as_deref())?;
            build_hardware_request(&manifest, &faults, &numbering, output.as_deref())?;
        }

        Commands::Analyze {
            response,
            json,
            strict,
            output,
        } => {
            let manifest = load_manifest(cli.manifest.as_deref())?;
            analyze_campaign(&manifest, &response, json, strict, output.as_deref())?;
        }
    }

    Ok(())
}

/// Load the manifest named on the command line, then ./cnnfi.toml, then the
/// built-in default
fn load_manifest(path: Option<&Path>) -> Result<Manifest> {
    let manifest = match path {
        Some(path) => cnnfi_manifest::from_path(path)
            .with_context(|| format!("Failed to load manifest {}", path.display()))?,
        None if Path::new(MANIFEST_FILE).exists() => cnnfi_manifest::from_path(MANIFEST_FILE)
            .with_context(|| format!("Failed to load {}", MANIFEST_FILE))?,
        None => {
            info!("No {} found, using built-in LeNet-5 defaults", MANIFEST_FILE);
            Manifest::default_lenet5()
        }
    };
    manifest.validate().context("Invalid manifest")?;
    info!("Using project '{}'", manifest.project.name);
    Ok(manifest)
}

fn read_json(path: &Path) -> Result<Value> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("Invalid JSON in {}", path.display()))
}

fn emit(contents: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            fs::write(path, contents)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Wrote {}", path.display());
        }
        None => println!("{}", contents),
    }
    Ok(())
}

/// Write a default manifest
fn init_manifest(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    cnnfi_manifest::write_to(&Manifest::default_lenet5(), path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Created {}", path.display());
    Ok(())
}

/// Print the IEEE-754 role and hardware index of a bit
fn describe_bit(index: i64, width: u32) -> Result<()> {
    let Some(width) = BitWidth::from_bits(width) else {
        bail!("Unsupported width {} (expected 8, 16 or 32)", width);
    };

    let hardware = to_hardware_bit(index, width)?;
    println!("Bit {} of a {} value", index, width);
    println!("  Hardware index (MSB-first): {}", hardware);
    if width == BitWidth::Bits32 {
        println!("  IEEE-754 field: {}", classify_ieee754_bit(index)?);
    }
    Ok(())
}

fn list_presets() {
    println!("Bit presets (32-bit software values):");
    for preset in BitPreset::all_presets() {
        let mask = preset.bits();
        let fields = describe_mask(&mask);
        println!(
            "  {:<18} {:>2} bits  sign {} / exponent {} / mantissa {}",
            preset.name(),
            mask.len(),
            fields.sign,
            fields.exponent,
            fields.mantissa
        );
    }
}

/// Replay a request through the validated spec and print a summary
fn validate_request(
    manifest: &Manifest,
    path: &Path,
    domain: &str,
    output: Option<&Path>,
) -> Result<()> {
    let value = read_json(path)?;

    let (spec, normalized) = match domain {
        "activation" => {
            if value.get("fault_config").is_some() {
                let campaign: ActivationCampaignRequest = serde_json::from_value(value)
                    .context("Malformed activation campaign request")?;
                let spec = FaultSpec::from_activation_request(&campaign.fault_config)?;
                let rebuilt = ActivationCampaignRequest::new(campaign.settings, &spec)?;
                (spec, serde_json::to_string_pretty(&rebuilt)?)
            } else {
                let request: ActivationFaultRequest = serde_json::from_value(value)
                    .context("Malformed activation fault request")?;
                let spec = FaultSpec::from_activation_request(&request)?;
                let rebuilt = spec.to_activation_request()?;
                (spec, serde_json::to_string_pretty(&rebuilt)?)
            }
        }
        "weight" => {
            let catalog = manifest.layer_catalog()?;
            if value.get("weight_fault_config").is_some() {
                let campaign: WeightCampaignRequest = serde_json::from_value(value)
                    .context("Malformed weight campaign request")?;
                let spec = FaultSpec::from_weight_request(&campaign.weight_fault_config, catalog)?;
                let rebuilt = WeightCampaignRequest::new(campaign.settings, &spec)?;
                (spec, serde_json::to_string_pretty(&rebuilt)?)
            } else {
                let request: WeightFaultRequest = serde_json::from_value(value)
                    .context("Malformed weight fault request")?;
                let spec = FaultSpec::from_weight_request(&request, catalog)?;
                let rebuilt = spec.to_weight_request()?;
                (spec, serde_json::to_string_pretty(&rebuilt)?)
            }
        }
        other => bail!("Unknown domain '{}' (expected activation or weight)", other),
    };

    print_spec_summary(&spec);
    if let Some(output) = output {
        emit(&normalized, Some(output))?;
    }
    Ok(())
}

fn print_spec_summary(spec: &FaultSpec) {
    println!(
        "Valid {} fault spec: {} layer(s), {}",
        spec.domain(),
        spec.len(),
        if spec.is_enabled() {
            "enabled"
        } else {
            "disabled (no faults will be injected)"
        }
    );

    for (id, config) in spec.layers() {
        match config.faults() {
            LayerFaults::Activation { rate, bits } => {
                let selection = if bits.is_empty() {
                    "service default".to_string()
                } else {
                    let fields = describe_mask(bits);
                    format!(
                        "{} (sign {}, exponent {}, mantissa {})",
                        format_mask(bits),
                        fields.sign,
                        fields.exponent,
                        fields.mantissa
                    )
                };
                println!(
                    "  {}: {} at rate {}, bits {}",
                    id,
                    config.kind(),
                    rate,
                    selection
                );
            }
            LayerFaults::Weight { target, sites } => {
                println!(
                    "  {}: {} on {}, {} position(s)",
                    id,
                    config.kind(),
                    target,
                    sites.len()
                );
                for site in sites {
                    println!("    {} bits {}", site.position, format_mask(&site.bits));
                }
            }
        }
    }
}

/// Build the hardware request from raw fault entries
fn build_hardware_request(
    manifest: &Manifest,
    path: &Path,
    numbering: &str,
    output: Option<&Path>,
) -> Result<()> {
    let numbering = match numbering {
        "lsb" => BitNumbering::LsbFirst,
        "msb" => BitNumbering::MsbFirst,
        other => bail!("Unknown bit numbering '{}' (expected lsb or msb)", other),
    };

    let raw = read_json(path)?;
    let plan = HardwareFaultPlan::from_raw_json(&raw, numbering, manifest.register_catalog()?)
        .with_context(|| format!("Invalid hardware faults in {}", path.display()))?;
    let request = plan.to_request()?;
    info!(
        "Hardware request: {} filter fault(s), {} bias fault(s)",
        request.filter_faults.len(),
        request.bias_faults.len()
    );

    emit(&serde_json::to_string_pretty(&request)?, output)
}

/// Classify a campaign response and report
fn analyze_campaign(
    manifest: &Manifest,
    path: &Path,
    json: bool,
    strict: bool,
    output: Option<&Path>,
) -> Result<()> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let response = CampaignResponse::from_json(&contents)
        .with_context(|| format!("Invalid campaign response in {}", path.display()))?;

    let classifier = CampaignClassifier::new(manifest.project.num_classes)?;
    let comparator = match &manifest.analysis.excluded_metrics {
        Some(excluded) => MetricsComparator::with_excluded(excluded.iter().cloned()),
        None => MetricsComparator::default(),
    };
    let analyzer = CampaignAnalyzer::new(classifier, comparator);

    let result = if strict {
        analyzer.analyze_strict(&response)?
    } else {
        analyzer.analyze(&response)
    };

    let rendered = if json {
        serde_json::to_string_pretty(&result)?
    } else {
        format_campaign_report(&result)
    };
    emit(&rendered, output)
}
