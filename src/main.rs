//! Binix Nav - cross-site navigation driver
//!
//! `--cli` runs a scripted session through a tab and prints every message
//! sent to the render surfaces. Without it a short summary is printed.

use std::env;

use binix_nav::{
    BrowserContext, CommitParams, NAME, NavigationConfig, ProcessManager, Result, Tab, Transition,
    VERSION,
};
use log::error;
use url::Url;

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    let config = match NavigationConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    if args.len() > 1 && args[1] == "--cli" {
        if let Err(e) = run_cli_mode(config) {
            error!("Scripted session failed: {}", e);
            eprintln!("❌ Session failed: {}", e);
            std::process::exit(1);
        }
    } else {
        run_summary_mode(&config);
    }
}

fn run_cli_mode(config: NavigationConfig) -> Result<()> {
    println!("🚀 {} v{} - scripted navigation session", NAME, VERSION);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let mut context = BrowserContext::new(config);
    let id = context.open_tab()?;

    let script = [
        "http://www.google.com",
        "http://www.google.com/search",
        "http://www.yahoo.com",
    ];
    for (page_id, url) in script.into_iter().enumerate() {
        context.with_tab(id, |tab, processes| visit(tab, processes, url, page_id as i32 + 1))??;
    }

    context.with_tab(id, |tab, processes| -> Result<()> {
        if let Some(surface) = tab.go_back(processes)? {
            finish_handshake(tab, processes);
            let url = Url::parse("http://www.google.com/search")?;
            tab.did_navigate(surface, CommitParams::main_frame(url, 2), processes);
            print_messages(tab);
        }
        Ok(())
    })??;

    if let Some(tab) = context.tab(id) {
        println!("\n📊 Tab {}", tab.id());
        println!("   • Surface swaps: {}", tab.status().swaps);
        println!("   • History entries: {}", tab.controller().entry_count());
        println!("   • Swapped-out surfaces: {}", tab.manager().swapped_out_count());
        println!("   • Renderer processes: {}", context.processes().renderer_count());
    }

    let remaining = context.shutdown();
    println!("\n✅ Shut down, {} final messages", remaining.len());
    Ok(())
}

fn visit(tab: &mut Tab, processes: &mut ProcessManager, url: &str, page_id: i32) -> Result<()> {
    println!("\n➡️  {}", url);
    let surface = tab.load_url(url, Transition::Typed, processes)?;
    finish_handshake(tab, processes);
    tab.did_navigate(surface, CommitParams::main_frame(Url::parse(url)?, page_id), processes);
    print_messages(tab);
    Ok(())
}

/// Answer the beforeunload, response and unload steps of a pending swap
fn finish_handshake(tab: &mut Tab, processes: &mut ProcessManager) {
    if !tab.manager().cross_navigation_pending() {
        return;
    }
    let current = tab.current_surface();
    tab.should_close_ack(true, true, processes);
    tab.cross_site_response(1, processes);
    tab.swap_out_ack(current, processes);
}

fn print_messages(tab: &mut Tab) {
    for message in tab.take_messages() {
        println!("   {} ← {}", message.target, message.message.as_str());
    }
}

fn run_summary_mode(config: &NavigationConfig) {
    println!("🚀 {} v{}", NAME, VERSION);
    println!("   • Process per tab: {}", config.process_per_tab);
    println!("   • Renderer process limit: {}", config.max_renderer_processes);
    println!("   • History entries per tab: {}", config.max_history_entries);
    println!("\n🔧 Run with --cli for a scripted navigation session");
}
