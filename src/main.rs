use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use storyline::config::{self, CollaboratorSettings};
use storyline::input::{cluster_name, load_articles, load_stories};
use storyline::output::{emit_json, ClassifyEnvelope, LinkEnvelope, StoryEnvelope};
use storyline::{CallMode, Pipeline, PipelineConfig, TopicPolicy};
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{ClassifyArgs, Command, LinkArgs, RootArgs, StoryArgs};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let args = RootArgs::parse();
    let settings = CollaboratorSettings::resolve(
        args.collaborator.model.as_deref(),
        args.collaborator.lm.as_deref(),
    )?;
    let backend = settings.build_backend()?;
    let call_mode = match &args.command {
        Command::Story(story) if story.split_calls => CallMode::Split,
        _ => CallMode::Unified,
    };
    let pipeline = Pipeline::new(backend, settings.model.clone()).with_call_mode(call_mode);
    tracing::debug!(model = %settings.model, "collaborator resolved");

    match args.command {
        Command::Story(args) => cmd_story(&pipeline, args),
        Command::Classify(args) => cmd_classify(&pipeline, args),
        Command::Link(args) => cmd_link(&pipeline, args),
    }
}

fn cmd_story(pipeline: &Pipeline<config::Backend>, args: StoryArgs) -> Result<()> {
    let pipeline_config = match &args.pipeline {
        Some(path) => config::load_pipeline_config(path)?,
        None => PipelineConfig::default(),
    };
    for warning in config::validate_config(&pipeline_config) {
        tracing::warn!("{warning}");
    }
    if let Some(path) = &args.dump_pipeline {
        config::write_pipeline_config(path, &pipeline_config)?;
        tracing::info!(path = %path.display(), "pipeline switches written");
    }

    let articles = load_articles(&args.articles)?;
    let name = args.name.unwrap_or_else(|| cluster_name(&args.articles));
    tracing::info!(cluster = %name, articles = articles.len(), "generating story");

    let story = pipeline
        .generate_story(&articles, &pipeline_config)
        .with_context(|| format!("generate story for {name}"))?;
    let envelope = StoryEnvelope {
        cluster_name: name,
        model: pipeline.model().to_string(),
        generated_at: Utc::now(),
        story,
    };
    emit_json(args.out.as_deref(), &envelope)
}

fn cmd_classify(pipeline: &Pipeline<config::Backend>, args: ClassifyArgs) -> Result<()> {
    let stories = load_stories(&args.stories)?;
    let name = args.name.unwrap_or_else(|| cluster_name(&args.stories));
    let policy = if args.strict_topics {
        TopicPolicy::Strict
    } else {
        TopicPolicy::Permissive
    };

    let classified_stories = pipeline
        .classify(&stories, policy)
        .with_context(|| format!("classify stories from {name}"))?;
    let envelope = ClassifyEnvelope {
        cluster_name: name,
        model: pipeline.model().to_string(),
        generated_at: Utc::now(),
        classified_stories,
    };
    emit_json(args.out.as_deref(), &envelope)
}

fn cmd_link(pipeline: &Pipeline<config::Backend>, args: LinkArgs) -> Result<()> {
    let group_a = load_stories(&args.group_a)?;
    let group_b = load_stories(&args.group_b)?;
    let links = pipeline
        .link(&group_a, &group_b)
        .context("link story groups")?;
    let envelope = LinkEnvelope {
        cluster_names: [cluster_name(&args.group_a), cluster_name(&args.group_b)],
        model: pipeline.model().to_string(),
        generated_at: Utc::now(),
        links,
    };
    emit_json(args.out.as_deref(), &envelope)
}
