use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use livingbooks::book::BookId;
use livingbooks::config::{config, Config};
use livingbooks::local_plan::LocalPlanStore;
use livingbooks::logging;
use livingbooks::reconcile::{Controller, Entry, Mode, SyncState};
use livingbooks::remote::{HttpPlanClient, PlanApi, PlanId};
use livingbooks::session::HttpSessionSource;
use livingbooks::status::{HasStatus, PlanStatus, StatusFilter};
use livingbooks::storage::FileStore;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "livingbooks")]
#[command(version = env!("LIVINGBOOKS_VERSION"))]
#[command(about = "Manage your family's Living Books reading plan")]
struct Args {
    /// Log debug output to the log file
    #[arg(long, global = true)]
    trace: bool,

    /// Work on this remote plan instead of the most recent one
    #[arg(long, global = true)]
    plan: Option<PlanId>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the reading plan
    List {
        /// all, to-read, reading or completed
        #[arg(short, long, default_value = "all")]
        filter: StatusFilter,
    },

    /// Add a book (as a guest, adding a book already in the plan removes it)
    Add { book_id: BookId },

    /// Change a book's reading status
    Status { book_id: BookId, status: PlanStatus },

    /// Replace a book's notes
    Notes { book_id: BookId, notes: String },

    /// Remove a book from the plan
    Remove { book_id: BookId },

    /// List your account's reading plans
    Plans,

    /// Copy books saved as a guest into a new account plan
    Import,

    /// Show the effective configuration
    Config {
        /// Write the effective configuration to the config file
        #[arg(long)]
        write: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    logging::init(args.trace);
    logging::cleanup_old_logs();
    tracing::info!("livingbooks starting");

    if let Err(e) = run(args).await {
        tracing::error!("{:?}", e);
        return Err(e);
    }
    Ok(())
}

async fn run(args: Args) -> Result<()> {
    match args.command {
        Command::Config { write } => show_config(write),
        command => run_plan_command(command, args.plan).await,
    }
}

fn show_config(write: bool) -> Result<()> {
    let cfg = config();
    print!("{}", cfg.display_string());
    if write {
        cfg.save()?;
        if let Some(path) = Config::path() {
            println!("\nWrote {}", path.display());
        }
    }
    Ok(())
}

async fn run_plan_command(command: Command, plan: Option<PlanId>) -> Result<()> {
    let cfg = config();
    let store = match &cfg.local.storage_dir {
        Some(dir) => FileStore::new(dir),
        None => FileStore::default_location()?,
    };
    let local = LocalPlanStore::with_key(Arc::new(store), cfg.local.storage_key.clone());
    let api: Arc<dyn PlanApi> = Arc::new(HttpPlanClient::new(&cfg.api)?);
    let sessions = Arc::new(HttpSessionSource::new(&cfg.api)?);

    let mut controller = Controller::new(local, api.clone(), sessions);
    controller.mount().await;
    if let Some(plan_id) = plan {
        if controller.session().is_some() {
            controller.select_plan(plan_id).await;
        } else {
            eprintln!("Ignoring --plan {}: not signed in", plan_id);
        }
    }

    match command {
        Command::List { filter } => print_plan(&controller, filter),
        Command::Add { book_id } => match controller.mode() {
            Mode::Guest => {
                let book = api
                    .get_book(book_id)
                    .await
                    .with_context(|| format!("Failed to look up book {}", book_id))?;
                if controller.toggle_local(book.clone()) {
                    println!("Added {} to your reading plan", book.byline());
                } else {
                    println!("Removed {} from your reading plan", book.byline());
                }
            }
            _ => {
                let item = controller.add_to_selected(book_id).await?;
                println!("Added {} to your reading plan", item.book.byline());
            }
        },
        Command::Status { book_id, status } => {
            let entry = find_entry(&controller, book_id)?;
            controller.set_status(entry.key(), status).await;
            report(&mut controller, &format!("{} is now {}", entry.book().title, status.label()));
        }
        Command::Notes { book_id, notes } => {
            let entry = find_entry(&controller, book_id)?;
            controller.set_notes(entry.key(), &notes).await;
            report(&mut controller, &format!("Updated notes for {}", entry.book().title));
        }
        Command::Remove { book_id } => {
            let entry = find_entry(&controller, book_id)?;
            controller.remove(entry.key()).await;
            report(&mut controller, &format!("Removed {}", entry.book().title));
        }
        Command::Plans => print_plans(&controller),
        Command::Import => {
            let plan = controller.import_local().await?;
            println!("Imported {} books into \"{}\"", plan.item_count, plan.name);
        }
        Command::Config { write } => show_config(write)?,
    }

    Ok(())
}

fn find_entry(controller: &Controller, book_id: BookId) -> Result<Entry> {
    controller
        .entries()
        .into_iter()
        .find(|e| e.book().id == book_id)
        .ok_or_else(|| anyhow::anyhow!("Book {} is not in your reading plan", book_id))
}

fn report(controller: &mut Controller, success: &str) {
    match controller.take_error() {
        Some(err) => eprintln!("Error: {}", err),
        None => println!("{}", success),
    }
}

fn print_plan(controller: &Controller, filter: StatusFilter) {
    match controller.mode() {
        Mode::Uninitialized => return,
        Mode::Guest => println!("My Reading Plan (guest)\n"),
        Mode::AccountEmpty => println!("You have no reading plans yet.\n"),
        Mode::AccountActive => {
            if let Some(plan) = controller.selected_plan() {
                let marker = if plan.is_ai_generated { " (curriculum)" } else { "" };
                println!("{}{}\n", plan.name, marker);
            }
        }
    }

    if controller.pending_import() {
        println!(
            "You have {} books saved on this device. Run `livingbooks import` to add them to your account.\n",
            controller.guest_entries().len()
        );
    }
    if let Some(err) = controller.last_error() {
        eprintln!("Error: {}\n", err);
    }

    let stats = controller.stats();
    println!(
        "Total {}  |  To Read {}  |  Reading {}  |  Completed {}",
        stats.total, stats.to_read, stats.reading, stats.completed
    );
    if let Some(pct) = stats.completion_percent() {
        println!(
            "Progress: {} of {} books completed ({}%)",
            stats.completed, stats.total, pct
        );
    }
    println!();

    let rows = controller.filtered(filter);
    if rows.is_empty() {
        match filter {
            StatusFilter::All => println!("Your reading plan is empty"),
            StatusFilter::Only(status) => println!("No {} books", status),
        }
        return;
    }

    for entry in rows {
        let flag = match entry.sync() {
            SyncState::Confirmed => "",
            SyncState::Pending => " (saving)",
            SyncState::Failed(_) => " (not saved)",
        };
        println!(
            "[{:>9}] #{} {}{}",
            entry.status().label(),
            entry.book().id,
            entry.book().byline(),
            flag
        );
        if !entry.book().age_range.is_empty() {
            println!("            Ages {}", entry.book().age_range);
        }
        if !entry.notes().is_empty() {
            println!("            {}", entry.notes());
        }
    }
}

fn print_plans(controller: &Controller) {
    if controller.session().is_none() {
        println!("Not signed in. Set LIVINGBOOKS_SESSION_TOKEN to use account plans.");
        return;
    }
    if let Some(err) = controller.last_error() {
        eprintln!("Error: {}", err);
    }
    let selected = controller.selected_plan().map(|p| p.id);
    for plan in controller.plans() {
        let marker = if Some(plan.id) == selected { "*" } else { " " };
        println!("{} {:>5}  {} ({} books)", marker, plan.id, plan.name, plan.item_count);
    }
    if controller.plans().is_empty() {
        println!("You have no reading plans yet.");
    }
}
