//! Kiln CLI - Command-line tool for inspecting device object archives.
//!
//! This is the main entry point for the kiln command-line application.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::Serialize;
use walkdir::WalkDir;

use kiln::archive::desc::{
    PipelineState, RenderPassDesc, ShaderCreateInfo, SignatureDesc, SignatureInternalData,
};
use kiln::dearchiver::{DeviceError, Error as UnpackError};
use kiln::prelude::*;

/// Kiln - device object archive tool
#[derive(Parser)]
#[command(name = "kiln")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the header and per-category resource counts of an archive
    Info {
        /// Path to the archive
        #[arg(env = "KILN_ARCHIVE")]
        archive: PathBuf,
    },

    /// List resources in an archive
    List {
        /// Path to the archive
        #[arg(env = "KILN_ARCHIVE")]
        archive: PathBuf,

        /// Only list this category (e.g. "graphics-pipeline")
        #[arg(short, long)]
        category: Option<ResourceCategory>,

        /// Filter pattern for resource names (glob-style)
        #[arg(short, long)]
        filter: Option<String>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Unpack every resource for one backend and report failures
    Validate {
        /// Archives, or directories searched for `.kiln` files, in load order
        #[arg(required = true)]
        archives: Vec<PathBuf>,

        /// Backend to validate (e.g. "vulkan", "d3d12")
        #[arg(short, long, env = "KILN_BACKEND")]
        backend: BackendId,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Info { archive } => {
            cmd_info(&archive)?;
        }
        Commands::List {
            archive,
            category,
            filter,
            json,
        } => {
            cmd_list(&archive, category, filter.as_deref(), json)?;
        }
        Commands::Validate { archives, backend } => {
            let failures = cmd_validate(&archives, backend)?;
            if failures > 0 {
                anyhow::bail!("{failures} resources failed to unpack");
            }
        }
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn open_archive(path: &Path) -> Result<ObjectArchive> {
    ObjectArchive::open(path).with_context(|| format!("Failed to open archive {}", path.display()))
}

fn cmd_info(path: &Path) -> Result<()> {
    let start = Instant::now();
    let archive = open_archive(path)?;
    let header = *archive.header();

    let format_version = header.version;
    let checksum = header.checksum;
    println!("Archive:         {}", path.display());
    println!("Size:            {} bytes", archive.bytes().len());
    println!("Format version:  {}", format_version);
    println!("Content version: {}", archive.content_version());
    println!("Checksum:        {:#010x}", checksum);
    println!("Parsed in {:?}", start.elapsed());
    println!();

    for category in ResourceCategory::ALL {
        println!("{:<22} {:>6}", category.as_str(), archive.resource_count(category));
    }

    let shader_sections: Vec<String> = BackendId::ALL
        .into_iter()
        .filter(|&b| archive.shader_count(b) > 0)
        .map(|b| format!("{b}={}", archive.shader_count(b)))
        .collect();
    if !shader_sections.is_empty() {
        println!("{:<22} {}", "shaders", shader_sections.join(" "));
    }

    Ok(())
}

#[derive(Serialize)]
struct ListEntry<'a> {
    category: &'static str,
    name: &'a str,
    header_size: u32,
    backends: Vec<&'static str>,
}

fn list_entries<'a>(
    archive: &'a ObjectArchive,
    category: Option<ResourceCategory>,
    filter: Option<&NameFilter>,
) -> Vec<ListEntry<'a>> {
    let categories: Vec<ResourceCategory> = match category {
        Some(category) => vec![category],
        None => ResourceCategory::ALL.to_vec(),
    };

    let mut entries = Vec::new();
    for category in categories {
        let mut names: Vec<&str> = archive
            .names(category)
            .filter(|name| filter.map_or(true, |filter| filter.matches(name)))
            .collect();
        names.sort_unstable();

        for name in names {
            let Some(entry) = archive.entry(category, name) else {
                continue;
            };
            entries.push(ListEntry {
                category: category.as_str(),
                name,
                header_size: entry.header.size,
                backends: entry.backends().map(BackendId::as_str).collect(),
            });
        }
    }
    entries
}

fn cmd_list(path: &Path, category: Option<ResourceCategory>, filter: Option<&str>, json: bool) -> Result<()> {
    let filter = filter.map(NameFilter::new).transpose()?;
    let archive = open_archive(path)?;
    let entries = list_entries(&archive, category, filter.as_ref());

    if json {
        let json = serde_json::to_string_pretty(&entries).context("Failed to serialize listing")?;
        println!("{json}");
        return Ok(());
    }

    for entry in &entries {
        println!(
            "{:<20} {:>8} {:<40} {}",
            entry.category,
            entry.header_size,
            entry.name,
            entry.backends.join(",")
        );
    }
    println!("\nTotal: {} resources", entries.len());

    Ok(())
}

/// Device that builds nothing and accepts every well-formed description.
struct ProbeDevice {
    backend: BackendId,
}

/// What a probed pipeline resolved to.
struct ProbePipeline {
    signatures: usize,
    shaders: usize,
    render_pass: bool,
}

impl RenderDevice for ProbeDevice {
    type Signature = ();
    type RenderPass = ();
    type Shader = ();
    type Pipeline = ProbePipeline;

    fn backend(&self) -> BackendId {
        self.backend
    }

    fn create_signature(
        &self,
        _desc: &SignatureDesc<'_>,
        _internal: &SignatureInternalData<'_>,
        _is_implicit: bool,
    ) -> std::result::Result<(), DeviceError> {
        Ok(())
    }

    fn create_render_pass(&self, _desc: &RenderPassDesc<'_>) -> std::result::Result<(), DeviceError> {
        Ok(())
    }

    fn create_shader(&self, _info: &ShaderCreateInfo<'_>) -> std::result::Result<(), DeviceError> {
        Ok(())
    }

    fn create_pipeline(
        &self,
        info: &PipelineCreateInfo<'_, Self>,
    ) -> std::result::Result<ProbePipeline, DeviceError> {
        if let PipelineState::RayTracing(rt) = &info.desc.state {
            if let Some(bad) = rt.shader_indices().find(|&i| i as usize >= info.shaders.len()) {
                return Err(format!("shader group references shader {bad} of {}", info.shaders.len()).into());
            }
        }
        Ok(ProbePipeline {
            signatures: info.signatures.len(),
            shaders: info.shaders.len(),
            render_pass: info.render_pass.is_some(),
        })
    }
}

/// Expand directories into the `.kiln` files beneath them, sorted by path.
fn collect_archives(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut archives = Vec::new();
    for input in inputs {
        if !input.is_dir() {
            archives.push(input.clone());
            continue;
        }
        let mut found: Vec<PathBuf> = WalkDir::new(input)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("kiln"))
            .map(|e| e.into_path())
            .collect();
        found.sort();
        archives.extend(found);
    }
    archives
}

fn unpack_one(
    dearchiver: &Dearchiver<ProbeDevice>,
    device: &ProbeDevice,
    category: ResourceCategory,
    name: &str,
) -> std::result::Result<bool, UnpackError> {
    let found = match category {
        ResourceCategory::Signature => dearchiver
            .unpack_signature(&SignatureUnpackInfo::new(device, name))?
            .is_some(),
        ResourceCategory::RenderPass => dearchiver
            .unpack_render_pass(&RenderPassUnpackInfo::new(device, name))?
            .is_some(),
        _ => {
            let Some(kind) = category.pipeline_kind() else {
                return Ok(false);
            };
            let Some(pipeline) = dearchiver.unpack_pipeline(&PipelineUnpackInfo::new(device, kind, name))? else {
                return Ok(false);
            };
            log::debug!(
                "{category} '{name}': {} signatures, {} shaders, render pass: {}",
                pipeline.signatures,
                pipeline.shaders,
                pipeline.render_pass
            );
            true
        }
    };
    Ok(found)
}

/// Returns the number of resources that failed to unpack.
fn cmd_validate(inputs: &[PathBuf], backend: BackendId) -> Result<usize> {
    let paths = collect_archives(inputs);
    if paths.is_empty() {
        anyhow::bail!("No archives found");
    }

    let mut dearchiver: Dearchiver<ProbeDevice> = Dearchiver::default();
    for path in &paths {
        let store = ByteStore::map_file(path).with_context(|| format!("Failed to map {}", path.display()))?;
        dearchiver
            .load_archive(store)
            .with_context(|| format!("Failed to load archive {}", path.display()))?;
        println!("Loaded {}", path.display());
    }

    // Each name once, from the archive it resolves to.
    let mut work: Vec<(ResourceCategory, String)> = Vec::new();
    for (index, archive) in dearchiver.archives().enumerate() {
        for category in ResourceCategory::ALL {
            work.extend(
                archive
                    .names(category)
                    .filter(|name| dearchiver.resolve(category, name) == Some(index))
                    .map(|name| (category, name.to_owned())),
            );
        }
    }

    println!("Validating {} resources for {}...", work.len(), backend);

    let pb = ProgressBar::new(work.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );

    let device = ProbeDevice { backend };
    let failures = AtomicUsize::new(0);
    let start = Instant::now();

    work.par_iter().for_each(|(category, name)| {
        if let Err(e) = unpack_one(&dearchiver, &device, *category, name) {
            failures.fetch_add(1, Ordering::Relaxed);
            pb.suspend(|| eprintln!("{category} '{name}': {e}"));
        }
        pb.inc(1);
    });

    pb.finish_with_message("Done");
    let failures = failures.into_inner();
    println!(
        "Validated {} resources in {:?} ({} failures)",
        work.len(),
        start.elapsed(),
        failures
    );

    Ok(failures)
}

/// Simple glob matching for filtering.
enum NameFilter {
    Substring(String),
    Glob(glob::Pattern),
}

impl NameFilter {
    /// Patterns without `*` match any name containing them.
    fn new(pattern: &str) -> Result<Self> {
        if !pattern.contains('*') {
            return Ok(Self::Substring(pattern.to_lowercase()));
        }
        let pattern = glob::Pattern::new(pattern)
            .with_context(|| format!("Invalid glob pattern: {pattern}"))?;
        Ok(Self::Glob(pattern))
    }

    fn matches(&self, name: &str) -> bool {
        match self {
            Self::Substring(needle) => name.to_lowercase().contains(needle),
            Self::Glob(pattern) => pattern.matches_with(
                name,
                glob::MatchOptions {
                    case_sensitive: false,
                    ..Default::default()
                },
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_archive::builder::ArchiveBuilder;
    use kiln_archive::desc::{PipelineDesc, PipelineInternalData, VariableType};
    use kiln_archive::HeaderFlags;

    fn sample_archive() -> ObjectArchive {
        let signature = SignatureDesc {
            name: "Globals",
            resources: &[],
            immutable_samplers: &[],
            binding_index: 0,
            use_combined_texture_samplers: false,
            combined_sampler_suffix: "_sampler",
            srb_allocation_granularity: 1,
        };
        let internal = SignatureInternalData {
            resource_attribs: &[],
            immutable_sampler_attribs: &[],
            dynamic_buffer_count: 0,
        };
        let pipeline = PipelineDesc {
            name: "Blur",
            srb_allocation_granularity: 1,
            immediate_context_mask: 1,
            default_variable_type: VariableType::Static,
            signature_names: &["Globals"],
            state: PipelineState::Compute,
        };

        let mut builder = ArchiveBuilder::new();
        builder.add_signature(&signature).unwrap();
        builder
            .add_signature_payload("Globals", BackendId::Vulkan, None, &internal)
            .unwrap();
        builder
            .add_signature_payload("Globals", BackendId::Direct3D12, None, &internal)
            .unwrap();
        builder.add_pipeline(&pipeline, HeaderFlags::empty()).unwrap();
        builder
            .add_pipeline_payload(
                PipelineKind::Compute,
                "Blur",
                BackendId::Vulkan,
                None,
                &PipelineInternalData { shader_positions: &[] },
            )
            .unwrap();
        ObjectArchive::parse(ByteStore::from(builder.build().unwrap())).unwrap()
    }

    fn matches(pattern: &str, name: &str) -> bool {
        NameFilter::new(pattern).unwrap().matches(name)
    }

    #[test]
    fn test_name_filter() {
        assert!(matches("Shadow*", "ShadowMap"));
        assert!(matches("*map", "ShadowMap"));
        assert!(matches("*ado*", "ShadowMap"));
        assert!(matches("blur", "GaussianBlur"));
        assert!(!matches("Shadow*", "NoShadow"));
        assert!(!matches("*map", "ShadowMaps"));
    }

    #[test]
    fn test_name_filter_suffix_repeats() {
        assert!(matches("*map", "MapMap"));
        assert!(matches("s*w*p", "ShadowMap"));
        assert!(!matches("*map*x", "MapMap"));
    }

    #[test]
    fn test_name_filter_invalid_pattern() {
        assert!(NameFilter::new("[*").is_err());
    }

    #[test]
    fn test_list_entries() {
        let archive = sample_archive();

        let all = list_entries(&archive, None, None);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].name, "Globals");
        assert_eq!(all[0].backends, ["d3d12", "vulkan"]);
        assert_eq!(all[1].category, "compute-pipeline");

        let filtered = list_entries(
            &archive,
            Some(ResourceCategory::Signature),
            Some(&NameFilter::new("glob*").unwrap()),
        );
        assert_eq!(filtered.len(), 1);
        assert!(list_entries(&archive, None, Some(&NameFilter::new("nothing").unwrap())).is_empty());
    }

    #[test]
    fn test_list_entries_json() {
        let archive = sample_archive();
        let entries = list_entries(&archive, Some(ResourceCategory::ComputePipeline), None);
        let value = serde_json::to_value(&entries).unwrap();
        assert_eq!(value[0]["name"], "Blur");
        assert_eq!(value[0]["backends"][0], "vulkan");
    }

    #[test]
    fn test_probe_unpacks_pipeline() {
        let mut dearchiver: Dearchiver<ProbeDevice> = Dearchiver::default();
        dearchiver
            .load_archive(ByteStore::from(sample_archive().bytes().to_vec()))
            .unwrap();

        let vulkan = ProbeDevice {
            backend: BackendId::Vulkan,
        };
        assert!(unpack_one(&dearchiver, &vulkan, ResourceCategory::ComputePipeline, "Blur").unwrap());

        let d3d12 = ProbeDevice {
            backend: BackendId::Direct3D12,
        };
        assert!(unpack_one(&dearchiver, &d3d12, ResourceCategory::Signature, "Globals").unwrap());
        assert!(matches!(
            unpack_one(&dearchiver, &d3d12, ResourceCategory::ComputePipeline, "Blur"),
            Err(UnpackError::MissingBackendData { .. })
        ));
    }
}
