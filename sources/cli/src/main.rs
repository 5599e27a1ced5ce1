use std::{fs, process::exit, str::FromStr};

use anyhow::{Context, Result};
use args::{Cli, Command};
use bytes::Bytes;
use clap::Parser;
use loader::{
    source::SourceDescriptor, Definition, HierarchyConfig, Inspector, LoadError,
    LoaderHierarchy,
};
use parse::builder::ClassFileBuilder;
use tracing::{error, info, Level};
use tracing_subscriber::fmt;

use crate::args::opts;

mod args;

/// Classes the bootstrap loader always provides.
fn builtin_classes() -> Result<Vec<(String, Bytes)>> {
    let object = "java/lang/Object";

    Ok(vec![
        (object.to_string(), ClassFileBuilder::new(object).build()?),
        (
            "java/lang/Class".to_string(),
            ClassFileBuilder::new("java/lang/Class").super_class(object).build()?,
        ),
        (
            "java/lang/String".to_string(),
            ClassFileBuilder::new("java/lang/String")
                .super_class(object)
                .interface("java/lang/CharSequence")
                .build()?,
        ),
        (
            "java/lang/CharSequence".to_string(),
            ClassFileBuilder::new("java/lang/CharSequence")
                .super_class(object)
                .flags(
                    parse::flags::ClassFileAccessFlags::ACC_PUBLIC
                        | parse::flags::ClassFileAccessFlags::ACC_INTERFACE
                        | parse::flags::ClassFileAccessFlags::ACC_ABSTRACT,
                )
                .build()?,
        ),
    ])
}

fn build_config(args: &Cli) -> Result<HierarchyConfig> {
    let mut config = HierarchyConfig::new();

    for (name, bytes) in builtin_classes()? {
        config.add_bootstrap_entry(name, bytes);
    }

    for (name, path) in &args.boot {
        let bytes = fs::read(path)
            .with_context(|| format!("reading built-in class {} from {}", name, path.display()))?;
        config.add_bootstrap_entry(name.clone(), bytes);
    }

    for path in &args.platform_path {
        config.add_platform_path(path);
    }

    for cp in &args.classpath {
        config.add_application_path(cp);
    }

    if let Some(timeout) = args.locate_timeout()? {
        config.with_locate_timeout(timeout);
    }

    Ok(config)
}

/// `class 52.0, extends java.lang.Object, implements java.lang.CharSequence (312 bytes)`
fn details(definition: &Definition) -> String {
    let kind = if definition.class_file().is_interface() {
        "interface"
    } else {
        "class"
    };

    let version = definition.version();
    let mut out = format!("{} {}.{}", kind, version.major_version, version.minor_version);

    if let Some(super_class) = definition.super_class() {
        out.push_str(&format!(", extends {}", super_class.binary()));
    }

    if !definition.interfaces().is_empty() {
        let interfaces: Vec<String> = definition.interfaces().iter().map(|i| i.binary()).collect();
        out.push_str(&format!(", implements {}", interfaces.join(", ")));
    }

    out.push_str(&format!(" ({} bytes)", definition.payload().len()));
    out
}

fn resolve(hierarchy: &LoaderHierarchy, names: &[String]) {
    let inspector = Inspector::new(hierarchy);

    for name in names {
        match hierarchy.resolve_from_application(name) {
            Ok(definition) => {
                let origin = inspector.describe(definition.origin());
                let origin_name = origin.as_ref().map_or("<unknown>", |o| o.name.as_str());

                println!("{}: {}", definition.name().binary(), origin_name);
                if let Some(origin) = origin {
                    println!("  {}", origin);
                }

                println!("  {}", details(&definition));
            }
            Err(e) => {
                if let LoadError::Internal(_) = e {
                    println!("/-------------------------------------------------------------\\");
                    println!("|The loader encountered an unrecoverable error and had to abort.|");
                    println!("\\-------------------------------------------------------------/");
                }

                println!("Could not resolve {}: {}", name, e);
                exit(1);
            }
        }
    }
}

fn chain(hierarchy: &LoaderHierarchy) {
    for descriptor in Inspector::new(hierarchy).describe_all() {
        println!("{}", descriptor);
    }
}

fn paths(hierarchy: &LoaderHierarchy) {
    for descriptor in Inspector::new(hierarchy).describe_all() {
        println!("{} ({}):", descriptor.name, descriptor.source_id);

        let entries: Vec<String> = match &descriptor.source {
            SourceDescriptor::PathList(paths) => {
                paths.iter().map(|p| p.display().to_string()).collect()
            }
            SourceDescriptor::Builtin(names) => names.iter().map(|n| n.to_string()).collect(),
            SourceDescriptor::Custom(desc) => vec![desc.clone()],
        };

        if entries.is_empty() {
            println!("  <empty>");
        }

        for entry in entries {
            println!("  {}", entry);
        }
    }
}

fn main() -> Result<()> {
    let args = Cli::parse();

    let level = match args.option(opts::LOG_LEVEL) {
        Some(level) => Level::from_str(level)
            .map_err(|_| anyhow::anyhow!("invalid {} {:?}", opts::LOG_LEVEL, level))?,
        None => Level::INFO,
    };

    let format = fmt::format()
        .with_ansi(true)
        .without_time()
        .with_level(true)
        .with_target(false)
        .with_thread_names(false)
        .with_source_location(true)
        .compact();

    tracing_subscriber::fmt()
        .with_max_level(level)
        .event_format(format)
        .with_writer(std::io::stderr)
        .init();

    let config = build_config(&args)?;
    let hierarchy = match LoaderHierarchy::new(&config) {
        Ok(hierarchy) => hierarchy,
        Err(e) => {
            error!("Could not build the loader hierarchy: {}", e);
            exit(1);
        }
    };

    match &args.command {
        Command::Resolve { names } => resolve(&hierarchy, names),
        Command::Chain => chain(&hierarchy),
        Command::Paths => paths(&hierarchy),
    }

    info!("Done");
    Ok(())
}
