mod cli;

use anime_watch_list::{AnimeInfo, Engine, ProgressEvent, ShowRecord, display_order};
use clap::Parser;
use cli::{Cli, Command};
use dialoguer::Confirm;
use serde::Serialize;
use std::error::Error;
use std::fs;
use std::process;
use tracing_subscriber::EnvFilter;

/// One row of `list --json`
#[derive(Serialize)]
struct ListEntry<'a> {
    index: usize,
    title: &'a str,
    status: &'a str,
    ep: &'a str,
    episodes: Option<&'a str>,
    current_url: &'a str,
    next_url: &'a str,
    myanimelist_url: &'a str,
    new: bool,
}

/// Handles progress events and prints formatted output to stderr
fn handle_progress_event(event: ProgressEvent) {
    match event {
        ProgressEvent::Started { tracked } => {
            eprintln!("Refreshing {} show(s)...", tracked);
        }
        ProgressEvent::CacheLoaded { entries } => {
            if entries == 0 {
                eprintln!("No cached shows, every show will be fetched.");
            }
        }
        ProgressEvent::ShowResolved {
            completed,
            total,
            title,
            status,
            from_cache,
        } => {
            let source = if from_cache { "cache" } else { "site" };
            match status.label() {
                "" => eprintln!("[{}/{}] {} ({})", completed, total, title, source),
                label => eprintln!("[{}/{}] {} ({}, {})", completed, total, title, source, label),
            }
        }
        ProgressEvent::Saved { .. } => {}
        ProgressEvent::Complete { shows, elapsed } => {
            eprintln!("Refreshed {} show(s) in {:.1}s\n", shows, elapsed.as_secs_f64());
        }
    }
}

fn print_show(index: usize, show: &ShowRecord) {
    let episode = match &show.episodes {
        Some(total) => format!("{}/{}", show.ep, total),
        None => show.ep.clone(),
    };
    let marker = if show.weight > 0 { " NEW" } else { "" };

    println!("{:>3}  {}  [ep {}]{}", index, show.display_title(), episode, marker);
    if show.has_next() {
        println!("     next: {}", show.next_url);
    }
}

fn print_info(show: &ShowRecord, info: &AnimeInfo) {
    println!("{}", show.title);
    println!("  English title: {}", info.title_english);
    println!("  Status:        {}", info.status);
    match info.episodes {
        Some(episodes) => println!("  Episodes:      {}", episodes),
        None => println!("  Episodes:      -"),
    }
    println!("  Aired:         {}", info.aired);
    println!("  Season:        {}", info.season);
    println!("  Broadcast:     {}", info.broadcast);
    println!("  Source:        {}", info.source);
    println!("  Score:         {}", info.score);
    println!("  Genres:        {}", info.genres);
    println!("  MyAnimeList:   {}", info.url);
    println!("\n{}", info.synopsis);
}

fn list(engine: &mut Engine, json: bool) -> Result<(), Box<dyn Error>> {
    if json {
        engine.refresh()?;
    } else {
        engine.refresh_with_progress(handle_progress_event)?;
    }

    let shows = engine.shows();
    let order = display_order(shows);

    if json {
        let entries: Vec<ListEntry> = order
            .iter()
            .map(|&index| {
                let show = &shows[index];
                ListEntry {
                    index,
                    title: &show.title,
                    status: show.status.label(),
                    ep: &show.ep,
                    episodes: show.episodes.as_deref(),
                    current_url: &show.current_url,
                    next_url: &show.next_url,
                    myanimelist_url: &show.myanimelist_url,
                    new: show.weight > 0,
                }
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if shows.is_empty() {
        println!("The watch list is empty. Add a show with `anime-watch-list add <url>`.");
        return Ok(());
    }

    for index in order {
        print_show(index, &shows[index]);
    }
    Ok(())
}

fn stats(engine: &mut Engine) -> Result<(), Box<dyn Error>> {
    engine.refresh_with_progress(handle_progress_event)?;
    let stats = engine.stats();

    let cache_size = fs::metadata(&engine.settings().cache_file)
        .map(|metadata| humansize::format_size(metadata.len(), humansize::DECIMAL))
        .unwrap_or_else(|_| "-".to_string());

    println!("Shows:                {}", stats.total);
    println!("Loaded from cache:    {}", stats.cached);
    println!("Not started:          {}", stats.not_started);
    println!("Not yet aired:        {}", stats.not_aired);
    println!("Waiting for episodes: {}", stats.without_next_episode);
    println!("Failed:               {}", stats.failed);
    if let Some(load_time) = stats.load_time {
        println!("Load time:            {:.2}s", load_time.as_secs_f64());
    }
    println!("Cache size:           {}", cache_size);
    Ok(())
}

fn remove_cache(engine: &Engine, yes: bool) -> Result<(), Box<dyn Error>> {
    let confirmed = yes
        || Confirm::new()
            .with_prompt("Delete the show cache? Every show will be fetched again")
            .default(false)
            .interact()?;

    if !confirmed {
        println!("Cache kept.");
        return Ok(());
    }

    if engine.remove_cache()? {
        println!("Cache removed.");
    } else {
        println!("There was no cache to remove.");
    }
    Ok(())
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let mut engine = Engine::new(cli.settings()?)?;

    match cli.command {
        Command::List { json } => list(&mut engine, json)?,
        Command::Add { url } => {
            engine.add_url(&url)?;
            println!("Added {}. It is resolved on the next refresh.", url.trim());
        }
        Command::Watch { index } => {
            engine.refresh_with_progress(handle_progress_event)?;
            let url = engine.advance_episode(index)?;
            println!("Enjoy: {}", url);
        }
        Command::SetEpisode { index, episode } => {
            engine.refresh_with_progress(handle_progress_event)?;
            if engine.edit_episode_number(index, &episode)? {
                println!("{} now points at episode {}.", engine.shows()[index].title, episode);
            } else {
                println!("Episode '{}' cannot be set for this show.", episode);
            }
        }
        Command::Remove { index } => {
            engine.refresh_with_progress(handle_progress_event)?;
            let removed = engine.remove_show(index)?;
            println!("No longer tracking {}.", removed.title);
        }
        Command::Info { index } => {
            engine.refresh_with_progress(handle_progress_event)?;
            let show = engine.shows().get(index).cloned();
            match (engine.lookup_metadata(index)?, show) {
                (Some(info), Some(show)) => print_info(&show, &info),
                _ => println!("No MyAnimeList entry matches this show."),
            }
        }
        Command::Stats => stats(&mut engine)?,
        Command::RemoveCache { yes } => remove_cache(&engine, yes)?,
    }

    Ok(())
}

fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli) {
        eprintln!("\nError: {}", e);
        process::exit(1);
    }
}
