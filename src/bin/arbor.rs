//! Arbor CLI: workspaces, folder trees, object graphs and page lineage.
//!
//! Usage:
//!   arbor [--db path] [--config path] [-v] workspace <subcommand>
//!   arbor folder|page|object <subcommand> <workspace> ...
//!
//! Workspaces are addressed by name. Folders, pages and nodes are addressed
//! by id or by name/title.

use arbor::config::init_logging;
use arbor::{
    ArborConfig, Command, DeletePolicy, DerivationContext, DropTarget, FolderId, ImportMode, NodeId, ObjectCommand,
    ObjectData, ObjectGraph, ObjectNode, OpenStore, OrderKey, Page, PageId, SearchQuery, SqliteStore, Transition,
    TreeCommand, TreeItem, Workspace, WorkspaceEngine, WorkspaceId,
};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "arbor", version, about = "Hierarchical workspace graph engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Path to SQLite database file
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Path to YAML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage workspaces
    Workspace {
        #[command(subcommand)]
        action: WorkspaceAction,
    },
    /// Manage page folders
    Folder {
        #[command(subcommand)]
        action: FolderAction,
    },
    /// Manage pages and their lineage
    Page {
        #[command(subcommand)]
        action: PageAction,
    },
    /// Edit and query the graph of an object page
    Object {
        #[command(subcommand)]
        action: ObjectAction,
    },
}

#[derive(Subcommand)]
enum WorkspaceAction {
    /// Create a new workspace
    Create {
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// List all workspaces
    List,
    /// Delete a workspace by name
    Delete { name: String },
}

#[derive(Subcommand)]
enum FolderAction {
    /// Create a folder
    Create {
        workspace: String,
        name: String,
        /// Parent folder (id or name); root level when omitted
        #[arg(long)]
        parent: Option<String>,
    },
    /// Rename a folder
    Rename {
        workspace: String,
        folder: String,
        name: String,
    },
    /// Delete a folder
    Delete {
        workspace: String,
        folder: String,
        /// Delete everything inside instead of moving it up a level
        #[arg(long)]
        cascade: bool,
    },
    /// Move a folder into another folder, or to root level
    Move {
        workspace: String,
        folder: String,
        #[arg(long)]
        into: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum PageKindArg {
    Regular,
    Object,
}

#[derive(Subcommand)]
enum PageAction {
    /// Create a page
    Create {
        workspace: String,
        title: String,
        #[arg(long, value_enum, default_value = "regular")]
        kind: PageKindArg,
        #[arg(long)]
        folder: Option<String>,
        /// Initial text of a regular page
        #[arg(long, default_value = "")]
        content: String,
        /// Node type of an object page's root
        #[arg(long, default_value = "root")]
        root_type: String,
    },
    /// Create a regular page derived from another page
    Derive {
        workspace: String,
        source: String,
        title: String,
        #[arg(long, default_value = "")]
        content: String,
        /// Free-form note on how the page was derived
        #[arg(long)]
        context: Option<String>,
    },
    /// Remove a page
    Remove { workspace: String, page: String },
    /// Show where a page came from and what was derived from it
    Lineage { workspace: String, page: String },
}

#[derive(Subcommand)]
enum ObjectAction {
    /// Add a node
    Add {
        workspace: String,
        page: String,
        name: String,
        #[arg(long = "type", default_value = "item")]
        node_type: String,
        /// Parent node (id or name); the root when omitted
        #[arg(long)]
        parent: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Delete a node and its subtree
    Delete {
        workspace: String,
        page: String,
        node: String,
    },
    /// Print the context bundle for a node
    Context {
        workspace: String,
        page: String,
        node: String,
    },
    /// Search nodes by name and description
    Search {
        workspace: String,
        page: String,
        query: String,
        #[arg(long = "type")]
        node_type: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Export the graph as JSON
    Export {
        workspace: String,
        page: String,
        /// Output file; stdout when omitted
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Import a graph from JSON
    Import {
        workspace: String,
        page: String,
        file: PathBuf,
        /// Merge into the existing graph instead of replacing it
        #[arg(long)]
        merge: bool,
    },
}

fn open_engine(db_path: PathBuf) -> Result<WorkspaceEngine, String> {
    let store = SqliteStore::open(&db_path).map_err(|e| format!("Failed to open database: {}", e))?;
    let engine = WorkspaceEngine::with_store(Arc::new(store));
    engine
        .load_all()
        .map_err(|e| format!("Failed to load workspaces: {}", e))?;
    Ok(engine)
}

/// Find a workspace by name, returning its snapshot
fn find_workspace(engine: &WorkspaceEngine, name: &str) -> Result<Arc<Workspace>, String> {
    engine
        .list_workspaces()
        .into_iter()
        .filter_map(|id| engine.get_workspace(&id))
        .find(|ws| ws.name == name || ws.id.as_str() == name)
        .ok_or_else(|| format!("workspace '{}' not found", name))
}

fn find_folder(ws: &Workspace, key: &str) -> Result<FolderId, String> {
    ws.pages
        .folders()
        .find(|f| f.id.as_str() == key)
        .or_else(|| ws.pages.folders().find(|f| f.name == key))
        .map(|f| f.id.clone())
        .ok_or_else(|| format!("folder '{}' not found", key))
}

fn find_page(ws: &Workspace, key: &str) -> Result<PageId, String> {
    let id = PageId::from(key);
    if ws.page(&id).is_some() {
        return Ok(id);
    }
    ws.pages
        .leaves()
        .find(|p| p.title == key)
        .map(|p| p.id.clone())
        .ok_or_else(|| format!("page '{}' not found", key))
}

fn find_graph<'w>(ws: &'w Workspace, key: &str) -> Result<(PageId, &'w ObjectGraph), String> {
    let id = find_page(ws, key)?;
    match ws.object_graph(&id) {
        Some(graph) => Ok((id, graph)),
        None => Err(format!("page '{}' is not an object page", key)),
    }
}

fn find_node(graph: &ObjectGraph, key: &str) -> Result<NodeId, String> {
    let id = NodeId::from(key);
    if graph.contains(&id) {
        return Ok(id);
    }
    graph
        .traversal_order()
        .into_iter()
        .find(|n| n.name == key)
        .map(|n| n.id.clone())
        .ok_or_else(|| format!("node '{}' not found", key))
}

/// Dispatch and report, returning an exit code
fn run(engine: &WorkspaceEngine, ws: &WorkspaceId, command: Command, done: impl FnOnce()) -> i32 {
    match engine.dispatch(ws, command) {
        Ok(Transition::Changed(_)) => {
            done();
            0
        }
        Ok(Transition::Unchanged) => {
            eprintln!("Nothing changed");
            1
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

macro_rules! try_or_exit {
    ($expr:expr) => {
        match $expr {
            Ok(v) => v,
            Err(e) => {
                eprintln!("Error: {}", e);
                return 1;
            }
        }
    };
}

fn cmd_workspace(engine: &WorkspaceEngine, action: WorkspaceAction) -> i32 {
    match action {
        WorkspaceAction::Create { name, description } => {
            if find_workspace(engine, &name).is_ok() {
                eprintln!("Error: workspace '{}' already exists", name);
                return 1;
            }
            let mut ws = Workspace::new(&name);
            ws.metadata.description = description;
            let id = try_or_exit!(engine.upsert_workspace(ws));
            println!("Created workspace '{}' ({})", name, id);
            0
        }
        WorkspaceAction::List => {
            let ids = engine.list_workspaces();
            if ids.is_empty() {
                println!("No workspaces defined.");
                return 0;
            }
            println!("{:<36}  {:<24}  {:>5}", "ID", "NAME", "PAGES");
            println!("{}", "-".repeat(70));
            for id in ids {
                if let Some(ws) = engine.get_workspace(&id) {
                    println!("{:<36}  {:<24}  {:>5}", id, ws.name, ws.pages.leaf_count());
                }
            }
            0
        }
        WorkspaceAction::Delete { name } => {
            let ws = try_or_exit!(find_workspace(engine, &name));
            try_or_exit!(engine.remove_workspace(&ws.id));
            println!("Deleted workspace '{}'", name);
            0
        }
    }
}

fn cmd_folder(engine: &WorkspaceEngine, action: FolderAction) -> i32 {
    match action {
        FolderAction::Create { workspace, name, parent } => {
            let ws = try_or_exit!(find_workspace(engine, &workspace));
            let parent = match parent {
                Some(p) => Some(try_or_exit!(find_folder(&ws, &p))),
                None => None,
            };
            let id = FolderId::new();
            let command = Command::Pages(TreeCommand::CreateFolder {
                id: id.clone(),
                name: name.clone(),
                parent,
            });
            run(engine, &ws.id, command, || println!("Created folder '{}' ({})", name, id))
        }
        FolderAction::Rename { workspace, folder, name } => {
            let ws = try_or_exit!(find_workspace(engine, &workspace));
            let id = try_or_exit!(find_folder(&ws, &folder));
            let command = Command::Pages(TreeCommand::RenameFolder { id, name: name.clone() });
            run(engine, &ws.id, command, || println!("Renamed folder '{}' to '{}'", folder, name))
        }
        FolderAction::Delete { workspace, folder, cascade } => {
            let ws = try_or_exit!(find_workspace(engine, &workspace));
            let id = try_or_exit!(find_folder(&ws, &folder));
            let policy = if cascade { DeletePolicy::Cascade } else { DeletePolicy::Flatten };
            let command = Command::Pages(TreeCommand::DeleteFolder { id, policy });
            run(engine, &ws.id, command, || println!("Deleted folder '{}'", folder))
        }
        FolderAction::Move { workspace, folder, into } => {
            let ws = try_or_exit!(find_workspace(engine, &workspace));
            let id = try_or_exit!(find_folder(&ws, &folder));
            let command = match into {
                Some(target) => Command::Pages(TreeCommand::Drop {
                    item: TreeItem::Folder(id),
                    target: DropTarget::IntoFolder {
                        folder: try_or_exit!(find_folder(&ws, &target)),
                    },
                }),
                None => {
                    let keys: Vec<OrderKey> = ws.pages.children_with_keys(None).into_iter().map(|(_, k)| k).collect();
                    Command::Pages(TreeCommand::MoveFolder {
                        id,
                        parent: None,
                        order: arbor::order::append(&keys).unwrap_or_default(),
                    })
                }
            };
            run(engine, &ws.id, command, || println!("Moved folder '{}'", folder))
        }
    }
}

fn cmd_page(engine: &WorkspaceEngine, action: PageAction) -> i32 {
    match action {
        PageAction::Create {
            workspace,
            title,
            kind,
            folder,
            content,
            root_type,
        } => {
            let ws = try_or_exit!(find_workspace(engine, &workspace));
            let mut page = match kind {
                PageKindArg::Regular => Page::regular(&title, content),
                PageKindArg::Object => {
                    Page::object(&title, ObjectGraph::with_root(ObjectNode::new(&title, root_type)))
                }
            };
            if let Some(folder) = folder {
                page = page.in_folder(try_or_exit!(find_folder(&ws, &folder)));
            }
            let id = page.id.clone();
            run(engine, &ws.id, Command::AddPage { page }, || {
                println!("Created page '{}' ({})", title, id)
            })
        }
        PageAction::Derive {
            workspace,
            source,
            title,
            content,
            context,
        } => {
            let ws = try_or_exit!(find_workspace(engine, &workspace));
            let source = try_or_exit!(find_page(&ws, &source));
            let page = Page::regular(&title, content);
            let id = page.id.clone();
            let mut derivation = DerivationContext::default();
            if let Some(note) = context {
                derivation = derivation.with_context(note);
            }
            let command = Command::DerivePage {
                source: source.clone(),
                page,
                context: derivation,
            };
            run(engine, &ws.id, command, || {
                println!("Derived page '{}' ({}) from {}", title, id, source)
            })
        }
        PageAction::Remove { workspace, page } => {
            let ws = try_or_exit!(find_workspace(engine, &workspace));
            let id = try_or_exit!(find_page(&ws, &page));
            run(engine, &ws.id, Command::RemovePage { id }, || println!("Removed page '{}'", page))
        }
        PageAction::Lineage { workspace, page } => {
            let ws = try_or_exit!(find_workspace(engine, &workspace));
            let id = try_or_exit!(find_page(&ws, &page));
            let tracker = ws.lineage();
            let title = |id: &PageId| ws.page(id).map(|p| p.title.clone()).unwrap_or_default();

            println!("Sources:");
            let sources = tracker.lineage_of(&id);
            if sources.is_empty() {
                println!("  (none)");
            }
            for source in &sources {
                println!("  {}  {}", source, title(source));
            }
            if let Some(missing) = tracker.dangling_source(&id) {
                println!("  {}  (deleted)", missing);
            }
            println!("Derived:");
            let derived = tracker.descendants(&id);
            if derived.is_empty() {
                println!("  (none)");
            }
            for page in &derived {
                println!("  {}  {}", page, title(page));
            }
            0
        }
    }
}

fn cmd_object(engine: &WorkspaceEngine, action: ObjectAction) -> i32 {
    match action {
        ObjectAction::Add {
            workspace,
            page,
            name,
            node_type,
            parent,
            description,
        } => {
            let ws = try_or_exit!(find_workspace(engine, &workspace));
            let (page_id, graph) = try_or_exit!(find_graph(&ws, &page));
            let parent = match parent {
                Some(p) => Some(try_or_exit!(find_node(graph, &p))),
                None => graph.root_node_id().cloned(),
            };
            let mut node = ObjectNode::new(&name, node_type);
            node.description = description;
            let id = node.id.clone();
            let command = Command::Object {
                page: page_id,
                command: ObjectCommand::AddNode { node, parent },
            };
            run(engine, &ws.id, command, || println!("Added node '{}' ({})", name, id))
        }
        ObjectAction::Delete { workspace, page, node } => {
            let ws = try_or_exit!(find_workspace(engine, &workspace));
            let (page_id, graph) = try_or_exit!(find_graph(&ws, &page));
            let id = try_or_exit!(find_node(graph, &node));
            let removed = graph.subtree(&id).len();
            let command = Command::Object {
                page: page_id,
                command: ObjectCommand::DeleteNode { id },
            };
            run(engine, &ws.id, command, || println!("Deleted {} node(s)", removed))
        }
        ObjectAction::Context { workspace, page, node } => {
            let ws = try_or_exit!(find_workspace(engine, &workspace));
            let (page_id, graph) = try_or_exit!(find_graph(&ws, &page));
            let id = try_or_exit!(find_node(graph, &node));
            match try_or_exit!(engine.context_bundle(&ws.id, &page_id, &id)) {
                Some(bundle) => {
                    println!("{}", bundle);
                    0
                }
                None => {
                    eprintln!("Error: node '{}' not found", node);
                    1
                }
            }
        }
        ObjectAction::Search {
            workspace,
            page,
            query,
            node_type,
            limit,
        } => {
            let ws = try_or_exit!(find_workspace(engine, &workspace));
            let (_, graph) = try_or_exit!(find_graph(&ws, &page));
            let mut search = SearchQuery::new(query);
            if let Some(t) = node_type {
                search = search.with_node_type(t);
            }
            if let Some(n) = limit {
                search = search.limit(n);
            }
            let hits = search.execute(graph);
            if hits.is_empty() {
                println!("No matches.");
                return 0;
            }
            println!("{:<36}  {:<24}  {:<12}", "ID", "NAME", "TYPE");
            println!("{}", "-".repeat(76));
            for id in hits {
                if let Some(node) = graph.node(&id) {
                    println!("{:<36}  {:<24}  {:<12}", id, node.name, node.node_type);
                }
            }
            0
        }
        ObjectAction::Export { workspace, page, out } => {
            let ws = try_or_exit!(find_workspace(engine, &workspace));
            let page_id = try_or_exit!(find_page(&ws, &page));
            let document = try_or_exit!(engine.export_object(&ws.id, &page_id));
            let json = try_or_exit!(serde_json::to_string_pretty(&document));
            match out {
                Some(path) => {
                    try_or_exit!(std::fs::write(&path, json));
                    println!("Exported {} node(s) to {}", document.nodes.len(), path.display());
                }
                None => println!("{}", json),
            }
            0
        }
        ObjectAction::Import {
            workspace,
            page,
            file,
            merge,
        } => {
            let ws = try_or_exit!(find_workspace(engine, &workspace));
            let page_id = try_or_exit!(find_page(&ws, &page));
            let json = try_or_exit!(std::fs::read_to_string(&file));
            let document: ObjectData = try_or_exit!(serde_json::from_str(&json));
            let mode = if merge { ImportMode::Merge } else { ImportMode::Replace };
            match engine.import_object(&ws.id, &page_id, document, mode) {
                Ok(Transition::Changed(next)) => {
                    let count = next.object_graph(&page_id).map_or(0, ObjectGraph::node_count);
                    println!("Imported; page now has {} node(s)", count);
                    0
                }
                Ok(Transition::Unchanged) => {
                    println!("Nothing changed");
                    0
                }
                Err(e) => {
                    eprintln!("Error: {}", e);
                    1
                }
            }
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ArborConfig::load(path),
        None => ArborConfig::load_default(),
    };
    let config = match config {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    let level = match cli.verbose {
        0 => config.log_level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    if let Err(e) = init_logging(level) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    let db_path = cli.db.unwrap_or_else(|| config.resolved_db_path());
    let engine = match open_engine(db_path) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let code = match cli.command {
        Commands::Workspace { action } => cmd_workspace(&engine, action),
        Commands::Folder { action } => cmd_folder(&engine, action),
        Commands::Page { action } => cmd_page(&engine, action),
        Commands::Object { action } => cmd_object(&engine, action),
    };
    std::process::exit(code);
}
