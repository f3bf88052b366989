use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use syxforge_core::category::available_categories;
use syxforge_core::ops::{self, DonorReplacements, RandomReplacements, SplitReport};
use syxforge_core::{category_code, ForgeError, ForgeSettings, PatchGenerator, Result, Workspace};

#[derive(Debug, Parser)]
#[command(name = "syxforge", version, about = "Synth preset bundle manager and random patch generator")]
struct Args {
    #[command(flatten)]
    paths: PathArgs,

    /// Seed for reproducible generation and naming.
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, ClapArgs)]
struct PathArgs {
    #[arg(long, global = true, default_value = "presets")]
    presets_dir: PathBuf,

    #[arg(long, global = true, default_value = "specs")]
    specs_dir: PathBuf,

    #[arg(long, global = true, default_value = "patch_schema.json")]
    schema: PathBuf,

    #[arg(long, global = true, default_value = "init.syx")]
    template: PathBuf,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the presets in a bundle and refresh its descriptor.
    Describe { file: PathBuf },
    /// Write every preset of a bundle to its own file.
    Split { file: PathBuf },
    /// Write selected presets (comma-separated positions or names) to their own files.
    Extract { file: PathBuf, list: String },
    /// Combine files and directories of presets into a new bundle.
    Group {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
    /// Reorder a bundle by category, then name.
    Sort { file: PathBuf },
    /// Rename a single preset file, optionally changing its category too.
    Rename {
        file: PathBuf,
        name: String,
        #[arg(long)]
        category: Option<String>,
    },
    /// Change the category of a single preset file.
    ChangeCategory { file: PathBuf, category: String },
    /// Generate new random presets of one category.
    Generate {
        #[arg(value_parser = parse_category)]
        category: u8,
        #[arg(long, default_value_t = 1)]
        count: usize,
    },
    /// Replace selected presets of a bundle with random ones or with donor files.
    Replace {
        file: PathBuf,
        list: String,
        #[arg(long, value_parser = parse_category, required_unless_present = "donors")]
        category: Option<u8>,
        /// Single preset files used round-robin instead of random generation.
        #[arg(long, num_args = 1.., conflicts_with = "category")]
        donors: Vec<PathBuf>,
    },
}

fn parse_category(raw: &str) -> std::result::Result<u8, String> {
    category_code(raw).ok_or_else(|| {
        format!(
            "unknown category '{raw}'. Available: {}",
            available_categories()
        )
    })
}

fn settings_from(args: &Args) -> ForgeSettings {
    ForgeSettings {
        presets_dir: args.paths.presets_dir.clone(),
        specs_dir: args.paths.specs_dir.clone(),
        schema_path: args.paths.schema.clone(),
        template_path: args.paths.template.clone(),
        seed: args.seed,
    }
}

fn print_split(report: &SplitReport, verb: &str) {
    if report.is_single() {
        println!(
            "{} contains {} preset(s); nothing to {verb}.",
            report.source.display(),
            report.total
        );
        return;
    }
    match &report.output_dir {
        Some(dir) => {
            for written in &report.written {
                println!("{} -> {}", written.summary, written.path.display());
            }
            println!("{} preset(s) written to {}", report.written.len(), dir.display());
        }
        None => println!("No presets matched; nothing written."),
    }
}

fn run(args: Args) -> Result<()> {
    let settings = settings_from(&args);
    let ws = Workspace::from_settings(&settings);

    match args.command {
        Command::Describe { file } => {
            let report = ops::describe(&file)?;
            for patch in &report.patches {
                println!("{patch}");
            }
            if let Some(descriptor) = report.descriptor {
                println!("Descriptor: {}", descriptor.display());
            }
        }
        Command::Split { file } => print_split(&ops::split(&ws, &file)?, "split"),
        Command::Extract { file, list } => print_split(&ops::extract(&ws, &file, &list)?, "extract"),
        Command::Group { inputs } => {
            let mut rng = settings.rng();
            let report = ops::group(&ws, &inputs, &mut rng)?;
            for (path, count) in &report.sources {
                println!("{}: {count} preset(s)", path.display());
            }
            println!(
                "Grouped {} preset(s) into {}",
                report.total,
                report.combined_path.display()
            );
        }
        Command::Sort { file } => {
            let report = ops::sort(&ws, &file)?;
            match &report.backup {
                Some(backup) => {
                    for patch in &report.after {
                        println!("{patch}");
                    }
                    println!(
                        "{} preset(s) moved; backup at {}",
                        report.moved,
                        backup.display()
                    );
                }
                None => println!("{} has nothing to sort.", file.display()),
            }
        }
        Command::Rename {
            file,
            name,
            category,
        } => {
            let report = match category {
                Some(raw) => {
                    let code = ops::category_for_edit(&file, &raw)?;
                    ops::rename_and_change_category(&ws, &file, &name, code)?
                }
                None => ops::rename(&ws, &file, &name)?,
            };
            println!(
                "{} ({}) -> {} ({}): {}",
                report.old_name,
                report.old_category,
                report.new_name,
                report.new_category,
                report.new_path.display()
            );
        }
        Command::ChangeCategory { file, category } => {
            let code = ops::category_for_edit(&file, &category)?;
            let report = ops::change_category(&ws, &file, code)?;
            println!(
                "{}: {} -> {} ({})",
                report.new_name,
                report.old_category,
                report.new_category,
                report.new_path.display()
            );
        }
        Command::Generate { category, count } => {
            let mut generator = PatchGenerator::from_settings(&settings, category)?;
            let report = ops::generate(&ws, &mut generator, count, category)?;
            for written in &report.written {
                println!("{} -> {}", written.summary, written.path.display());
            }
            if let Some(combined) = report.combined_path {
                println!("Bundle: {}", combined.display());
            }
        }
        Command::Replace {
            file,
            list,
            category,
            donors,
        } => {
            let report = if donors.is_empty() {
                let code = category.ok_or_else(|| {
                    ForgeError::Config("replace needs --category or --donors".to_string())
                })?;
                let mut generator = PatchGenerator::from_settings(&settings, code)?;
                let mut source = RandomReplacements::new(&mut generator, code);
                ops::replace(&ws, &file, &list, &mut source)?
            } else {
                let (mut source, _) = DonorReplacements::load(&donors)?;
                ops::replace(&ws, &file, &list, &mut source)?
            };
            for slot in &report.replaced {
                println!(
                    "{:2}: {} -> {} ({})",
                    slot.position, slot.old_name, slot.new_name, slot.category
                );
            }
            println!("Backup at {}", report.backup.display());
        }
    }
    Ok(())
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    if let Err(err) = run(args) {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}
