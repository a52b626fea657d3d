use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use jremap::classfile::defs::attribute_names::STACK_MAP_TABLE;
use jremap::classfile::frame::describe_stack_map_frames;
use jremap::classfile::{AttributeBody, ClassRecord, StackMapTable, SymbolCollector};
use jremap::config::parse_mapping_lines;
use jremap::{Config, JdkSource, OutputMode};

#[derive(Parser)]
#[command(name = "jremap")]
#[command(about = "Rename symbols inside compiled JVM class files")]
#[command(version)]
struct Cli {
    /// Raise log verbosity (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rewrite a class output directory
    Process {
        /// Directory of compiled classes
        #[arg(long, value_name = "DIR")]
        classes: PathBuf,

        /// Rename rule, e.g. com.old.Foo=com.new.Bar or com.old:all=com.new
        #[arg(long = "map", value_name = "KEY=VALUE")]
        mappings: Vec<String>,

        /// File of key=value rename rules
        #[arg(long, value_name = "FILE")]
        mapping_file: Option<PathBuf>,

        /// Extra classpath for hierarchy queries
        #[arg(long, value_name = "PATHS")]
        classpath: Option<String>,

        /// JDK whose jmods back hierarchy queries [default: $JAVA_HOME, else the `java` on PATH]
        #[arg(long, value_name = "DIR", conflicts_with = "no_jdk")]
        jdk_home: Option<PathBuf>,

        /// Resolve JDK types from the built-in table only
        #[arg(long)]
        no_jdk: bool,

        /// Overwrite changed class files instead of writing a side directory
        #[arg(long, conflicts_with_all = ["target", "archive", "no_archive"])]
        in_place: bool,

        /// Side directory for rewritten classes [default: <classes>_remap_work]
        #[arg(long, value_name = "DIR")]
        target: Option<PathBuf>,

        /// Jar to build [default: <target>.jar]
        #[arg(long, value_name = "FILE", conflicts_with = "no_archive")]
        archive: Option<PathBuf>,

        /// Do not build a jar
        #[arg(long)]
        no_archive: bool,
    },

    /// Show the header and symbol occurrences of a class file
    Inspect {
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Also print StackMapTable frames
        #[arg(short, long)]
        frames: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_module("jremap", level)
        .parse_default_env()
        .target(env_logger::Target::Stderr)
        .format_timestamp(None)
        .init();

    match cli.command {
        Commands::Process {
            classes,
            mappings,
            mapping_file,
            classpath,
            jdk_home,
            no_jdk,
            in_place,
            target,
            archive,
            no_archive,
        } => {
            let mut config = Config::new(classes);
            for raw in &mappings {
                let pairs = parse_mapping_lines(raw).with_context(|| format!("invalid --map '{}'", raw))?;
                config = config.with_mappings(pairs);
            }
            if let Some(path) = mapping_file {
                config = config.with_mapping_file(&path)?;
            }
            if let Some(classpath) = classpath {
                config = config.with_classpath(&classpath);
            }
            if no_jdk {
                config = config.with_jdk(JdkSource::Disabled);
            } else if let Some(home) = jdk_home {
                config = config.with_jdk(JdkSource::Home(home));
            }
            if in_place {
                config = config.in_place();
            } else {
                if let Some(target) = target {
                    config = config.with_target(target);
                }
                if no_archive {
                    config = config.with_archive(None);
                } else if archive.is_some() {
                    config = config.with_archive(archive);
                }
            }
            process(&config)
        }
        Commands::Inspect { input, frames } => inspect(&input, frames),
    }
}

fn process(config: &Config) -> Result<()> {
    let summary = jremap::run(config)?;
    if summary.skipped {
        println!("Nothing to do: no mapping configured");
        return Ok(());
    }
    for outcome in summary.outcomes.iter().filter(|o| o.changed) {
        println!("rewritten {}", outcome.relative_path.display());
    }
    match &config.output {
        OutputMode::InPlace => println!("{} of {} class files changed", summary.changed_count(), summary.outcomes.len()),
        OutputMode::SideDirectory { target, .. } => println!(
            "{} of {} class files changed, written to {}",
            summary.changed_count(),
            summary.outcomes.len(),
            target.display()
        ),
    }
    if let Some(archive) = &summary.archive {
        println!("archive {}", archive.display());
    }
    Ok(())
}

fn inspect(input: &Path, frames: bool) -> Result<()> {
    let bytes = fs::read(input).with_context(|| format!("read {}", input.display()))?;
    let class = ClassRecord::parse(&bytes).with_context(|| format!("parse {}", input.display()))?;
    let header = class.header()?;

    println!("class {} (version {}.{})", header.name, class.major_version, class.minor_version);
    if let Some(super_name) = &header.super_name {
        println!("  extends {}", super_name);
    }
    for interface in &header.interfaces {
        println!("  implements {}", interface);
    }
    println!("symbols:");
    for occurrence in SymbolCollector::collect(&class)? {
        println!("  {:?}", occurrence);
    }

    if frames {
        let pool = &class.constant_pool;
        for method in &class.methods {
            let name = pool.utf8(method.name_index)?;
            let descriptor = pool.utf8(method.descriptor_index)?;
            for attribute in &method.attributes {
                let AttributeBody::Code(code) = &attribute.body else {
                    continue;
                };
                for nested in &code.attributes {
                    if let AttributeBody::Raw(data) = &nested.body {
                        if nested.name(pool)? == STACK_MAP_TABLE {
                            println!("frames {}{}:", name, descriptor);
                            for line in describe_stack_map_frames(&StackMapTable::parse(data)?) {
                                println!("  {}", line);
                            }
                        }
                    }
                }
            }
        }
    }
    Ok(())
}
