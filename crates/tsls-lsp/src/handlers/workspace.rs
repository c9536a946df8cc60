//! Workspace-scoped handlers: symbol search and the cross-repository
//! extension methods.

use tokio_util::sync::CancellationToken;
use tower_lsp::jsonrpc;
use tower_lsp::lsp_types::{Location, SymbolInformation, Url, WorkspaceSymbolParams};
use tracing::debug;

use tsls_backend::{NavigationTree, SymbolDescriptor};
use tsls_project::files;
use tsls_project::packages::PackageJson;
use tsls_vfs::LibrarySet;

use crate::ext::{
    DependencyAttributes, DependencyHints, DependencyReference, PackageInformation,
    ReferenceInformation, WorkspaceReferencesParams, WorkspaceSymbolQuery,
};
use crate::state::{ServerState, Workspace};

use super::{lsp_utils, to_rpc_error};

const DEFAULT_SYMBOL_LIMIT: usize = 100;

/// Standard `workspace/symbol`: free-text queries.
pub async fn symbol(
    state: &ServerState,
    params: WorkspaceSymbolParams,
) -> jsonrpc::Result<Option<Vec<SymbolInformation>>> {
    let query = WorkspaceSymbolQuery {
        query: Some(params.query),
        symbol: None,
        limit: None,
    };
    symbol_query(state, query).await.map(Some)
}

/// The extended query shape: free text or a structured descriptor.
pub async fn symbol_query(
    state: &ServerState,
    params: WorkspaceSymbolQuery,
) -> jsonrpc::Result<Vec<SymbolInformation>> {
    let workspace = state.workspace()?;
    debug!("workspace symbol query {params:?}");

    let token = CancellationToken::new();
    workspace
        .manager
        .ensure_files_for_workspace_symbol(&token)
        .await
        .map_err(to_rpc_error)?;

    let limit = params.limit.unwrap_or(DEFAULT_SYMBOL_LIMIT);
    match params.symbol {
        Some(descriptor) => structured_symbol_query(&workspace, &descriptor, limit),
        None => free_text_symbol_query(&workspace, &params.query.unwrap_or_default(), limit),
    }
}

fn free_text_symbol_query(
    workspace: &Workspace,
    query: &str,
    limit: usize,
) -> jsonrpc::Result<Vec<SymbolInformation>> {
    let mut found = Vec::new();
    for config in workspace.manager.configurations() {
        if let Err(err) = config.ensure_all_files() {
            debug!("skipping configuration at {}: {err}", config.root());
            continue;
        }
        let Ok(service) = config.service() else {
            continue;
        };
        let Ok(items) = service.navigate_to(query, limit) else {
            continue;
        };
        for item in items {
            let Some(location) = lsp_utils::location_for(&workspace.fs, &item.uri, item.span)
            else {
                continue;
            };
            found.push((
                item.uri.path().to_string(),
                item.span.start,
                symbol_information(
                    item.name,
                    &item.kind,
                    location,
                    item.container_name,
                ),
            ));
        }
    }
    // Deterministic: by file path, then by position in the file.
    found.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));
    Ok(found
        .into_iter()
        .take(limit)
        .map(|(_, _, symbol)| symbol)
        .collect())
}

fn structured_symbol_query(
    workspace: &Workspace,
    query: &SymbolDescriptor,
    limit: usize,
) -> jsonrpc::Result<Vec<SymbolInformation>> {
    let mut scored: Vec<(u32, String, SymbolInformation)> = Vec::new();
    for config in workspace.manager.configurations() {
        if let Err(err) = config.ensure_all_files() {
            debug!("skipping configuration at {}: {err}", config.root());
            continue;
        }
        if let Some(package) = query.package.as_ref().and_then(|pkg| pkg.name.as_deref()) {
            if config.package_name().as_deref() != Some(package) {
                continue;
            }
        }
        let Ok(service) = config.service() else {
            continue;
        };
        for file in service.program_files() {
            if LibrarySet::is_library_uri(&file) {
                continue;
            }
            let Ok(tree) = service.navigation_tree(&file) else {
                continue;
            };
            for child in &tree.child_items {
                score_tree(workspace, &file, child, None, query, &mut scored);
            }
        }
    }
    scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
    Ok(scored
        .into_iter()
        .take(limit)
        .map(|(_, _, symbol)| symbol)
        .collect())
}

fn score_tree(
    workspace: &Workspace,
    uri: &Url,
    node: &NavigationTree,
    container: Option<&NavigationTree>,
    query: &SymbolDescriptor,
    out: &mut Vec<(u32, String, SymbolInformation)>,
) {
    // The package constraint restricts which configurations are searched;
    // it does not score individual nodes.
    let candidate = SymbolDescriptor {
        name: Some(node.text.clone()),
        kind: Some(node.kind.clone()),
        container_name: container.map(|parent| parent.text.clone()),
        container_kind: container.map(|parent| parent.kind.clone()),
        file_path: Some(uri.path().to_string()),
        package: None,
    };
    let score = candidate.score(&SymbolDescriptor {
        package: None,
        ..query.clone()
    });
    if score > 0 {
        if let Some(span) = node.spans.first() {
            if let Some(location) = lsp_utils::location_for(&workspace.fs, uri, *span) {
                out.push((
                    score,
                    uri.path().to_string(),
                    symbol_information(
                        node.text.clone(),
                        &node.kind,
                        location,
                        container.map(|parent| parent.text.clone()),
                    ),
                ));
            }
        }
    }
    for child in &node.child_items {
        score_tree(workspace, uri, child, Some(node), query, out);
    }
}

#[allow(deprecated)]
fn symbol_information(
    name: String,
    kind: &str,
    location: Location,
    container_name: Option<String>,
) -> SymbolInformation {
    SymbolInformation {
        name,
        kind: lsp_utils::symbol_kind(kind),
        tags: None,
        deprecated: None,
        location,
        container_name,
    }
}

/// `workspace/xreferences`: every reference, across the workspace, to
/// symbols matching the descriptor.
pub async fn x_references(
    state: &ServerState,
    params: WorkspaceReferencesParams,
) -> jsonrpc::Result<Vec<ReferenceInformation>> {
    let workspace = state.workspace()?;
    debug!("workspace/xreferences {:?}", params.query);

    let token = CancellationToken::new();
    workspace
        .manager
        .ensure_files_for_workspace_symbol(&token)
        .await
        .map_err(to_rpc_error)?;

    let dependee = params
        .hints
        .as_ref()
        .and_then(|hints| hints.dependee_package_name.as_deref());

    let mut found = Vec::new();
    for config in workspace.manager.configurations() {
        if let Some(dependee) = dependee {
            if config.package_name().as_deref() != Some(dependee) {
                continue;
            }
        }
        if let Err(err) = config.ensure_all_files() {
            debug!("skipping configuration at {}: {err}", config.root());
            continue;
        }
        let Ok(service) = config.service() else {
            continue;
        };
        for file in service.program_files() {
            if LibrarySet::is_library_uri(&file) || files::is_dependency_file(&file) {
                continue;
            }
            let Ok(content) = workspace.fs.get_content(&file) else {
                continue;
            };
            let Ok(identifiers) = service.identifiers_in(&file) else {
                continue;
            };
            for occurrence in identifiers {
                let Ok(Some(mut symbol)) = service.symbol_at(&file, occurrence.offset) else {
                    continue;
                };
                if symbol.package.is_none() {
                    symbol.package = config.package_descriptor();
                }
                if !symbol.matches(&params.query) {
                    continue;
                }
                let span = tsls_backend::TextSpan::new(
                    occurrence.offset,
                    occurrence.text.len() as u32,
                );
                found.push(ReferenceInformation {
                    reference: Location {
                        uri: file.clone(),
                        range: lsp_utils::span_to_range(&content, span),
                    },
                    symbol,
                });
            }
        }
    }
    Ok(found)
}

/// `workspace/xdependencies`: every dependency declared by a
/// `package.json` in the workspace, with its dependee as a hint.
pub async fn x_dependencies(state: &ServerState) -> jsonrpc::Result<Vec<DependencyReference>> {
    let workspace = state.workspace()?;
    let token = CancellationToken::new();
    workspace
        .manager
        .ensure_module_structure(&token)
        .await
        .map_err(to_rpc_error)?;

    let mut dependencies = Vec::new();
    for (_, package) in workspace_packages(&workspace) {
        let dependee = package.name.clone();
        for (name, version, kind) in package.all_dependencies() {
            dependencies.push(DependencyReference {
                attributes: DependencyAttributes {
                    name: Some(name),
                    version: Some(version),
                    kind: Some(kind.to_string()),
                },
                hints: DependencyHints {
                    dependee_package_name: dependee.clone(),
                },
            });
        }
    }
    Ok(dependencies)
}

/// `workspace/xpackages`: every package in the workspace with its
/// declared dependencies.
pub async fn x_packages(state: &ServerState) -> jsonrpc::Result<Vec<PackageInformation>> {
    let workspace = state.workspace()?;
    let token = CancellationToken::new();
    workspace
        .manager
        .ensure_module_structure(&token)
        .await
        .map_err(to_rpc_error)?;

    let mut packages = Vec::new();
    for (_, package) in workspace_packages(&workspace) {
        let dependencies = package
            .all_dependencies()
            .into_iter()
            .map(|(name, version, kind)| DependencyReference {
                attributes: DependencyAttributes {
                    name: Some(name),
                    version: Some(version),
                    kind: Some(kind.to_string()),
                },
                hints: DependencyHints::default(),
            })
            .collect();
        packages.push(PackageInformation {
            package: package.descriptor(),
            dependencies,
        });
    }
    Ok(packages)
}

/// Every parseable `package.json` outside `node_modules/`, in URI order.
fn workspace_packages(workspace: &Workspace) -> Vec<(Url, PackageJson)> {
    let mut manifests: Vec<Url> = workspace
        .fs
        .uris()
        .into_iter()
        .filter(|uri| files::is_package_json(uri) && !files::is_dependency_file(uri))
        .collect();
    manifests.sort_by(|a, b| a.as_str().cmp(b.as_str()));
    manifests
        .into_iter()
        .filter_map(|uri| {
            let text = workspace.fs.get_content(&uri).ok()?;
            let package = PackageJson::parse(&text)?;
            Some((uri, package))
        })
        .collect()
}
