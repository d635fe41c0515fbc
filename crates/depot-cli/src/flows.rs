use std::path::PathBuf;

use anyhow::{Context, Result};
use depot_core::{DeploymentType, PackageVersion, ServiceResult};
use depot_installer::{
    absolute_path, default_user_prefix, ConfigFileTransform, DeployLayout, FileRegistry,
    InstallRequest, InstalledPackageRecord, InstalledPackageRegistry, Installer,
    InstallerServices, LocalFileSystem, ProcessScriptExecutor, Settings, SystemSettingsTransform,
    Uninstaller,
};
use depot_registry::{ConfiguredRepositories, RepositoryRecord, RepositoryStore};
use tracing::debug;

use crate::render::{eprint_status, print_lines, print_status, OutputStyle};
use crate::{InstallArgs, RepoCommands};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CommandOutcome {
    Completed,
    Failed,
}

/// Resolved prefix layout plus `config.toml` settings.
#[derive(Debug, Clone)]
pub(crate) struct DeployContext {
    pub(crate) layout: DeployLayout,
    pub(crate) settings: Settings,
}

impl DeployContext {
    pub(crate) fn open(prefix: Option<PathBuf>) -> Result<Self> {
        let prefix = match prefix {
            Some(prefix) => prefix,
            None => default_user_prefix()?,
        };
        let layout = DeployLayout::new(absolute_path(&prefix));
        let settings = Settings::load_for(&layout)?;
        debug!(prefix = %layout.prefix().display(), "resolved deploy prefix");
        Ok(Self { layout, settings })
    }

    pub(crate) fn target_root(&self) -> PathBuf {
        absolute_path(&self.settings.resolve_target_root(&self.layout))
    }

    fn repository_store(&self) -> RepositoryStore {
        RepositoryStore::new(self.layout.state_dir())
    }

    fn installed_registry(&self) -> FileRegistry {
        FileRegistry::new(self.layout.installed_registry_path())
    }
}

pub(crate) fn build_install_request(args: InstallArgs) -> InstallRequest {
    InstallRequest {
        id: args.id,
        deployment_type: DeploymentType::parse(&args.deployment_type),
        force: args.force,
        system_setting_profiles: Some(args.system_profiles),
        build_config_profiles: Some(args.build_profiles),
    }
}

pub(crate) fn run_install_command(
    context: &DeployContext,
    args: InstallArgs,
    style: OutputStyle,
) -> Result<CommandOutcome> {
    context.layout.ensure_base_dirs()?;
    let browser = ConfiguredRepositories::open(
        &context.repository_store(),
        context.layout.package_cache_dir(),
    )?;
    let registry = context.installed_registry();
    let scripts = ProcessScriptExecutor::new(context.settings.script_host.clone());
    let installer = Installer::new(
        InstallerServices {
            browser: &browser,
            registry: &registry,
            fs: &LocalFileSystem,
            scripts: &scripts,
            system_settings: &SystemSettingsTransform,
            config_files: &ConfigFileTransform,
        },
        context.target_root(),
    );

    let result = installer.install(&build_install_request(args))?;
    Ok(report_service_result(style, &result))
}

pub(crate) fn run_uninstall_command(
    context: &DeployContext,
    id: &str,
    version: Option<&PackageVersion>,
    style: OutputStyle,
) -> Result<CommandOutcome> {
    let registry = context.installed_registry();
    let scripts = ProcessScriptExecutor::new(context.settings.script_host.clone());
    let uninstaller =
        Uninstaller::new(&registry, &LocalFileSystem, &scripts, context.target_root());

    let result = uninstaller.uninstall(id, version)?;
    Ok(report_service_result(style, &result))
}

pub(crate) fn run_list_command(context: &DeployContext, json: bool) -> Result<CommandOutcome> {
    let installed = context.installed_registry().installed_packages()?;
    if json {
        let rendered = serde_json::to_string_pretty(&installed)
            .context("failed serializing installed packages")?;
        println!("{rendered}");
    } else {
        print_lines(&format_installed_lines(&installed));
    }
    Ok(CommandOutcome::Completed)
}

pub(crate) fn run_repo_command(
    context: &DeployContext,
    command: RepoCommands,
    style: OutputStyle,
) -> Result<CommandOutcome> {
    let store = context.repository_store();
    match command {
        RepoCommands::Add {
            name,
            url,
            priority,
        } => {
            store.add(RepositoryRecord::new(name.clone(), url, priority))?;
            print_status(style, "ok", &format!("added repository {name}"));
        }
        RepoCommands::List => {
            print_lines(&format_repository_lines(&store.list()?));
        }
        RepoCommands::Remove { name } => {
            store.remove(&name)?;
            print_status(style, "ok", &format!("removed repository {name}"));
        }
        RepoCommands::Enable { name } => {
            store.set_enabled(&name, true)?;
            print_status(style, "ok", &format!("enabled repository {name}"));
        }
        RepoCommands::Disable { name } => {
            store.set_enabled(&name, false)?;
            print_status(style, "ok", &format!("disabled repository {name}"));
        }
    }
    Ok(CommandOutcome::Completed)
}

pub(crate) fn run_doctor_command(context: &DeployContext) -> Result<CommandOutcome> {
    let repositories = context.repository_store().list()?;
    let installed = context.installed_registry().installed_packages()?;
    print_lines(&format_doctor_lines(context, &repositories, installed.len()));
    Ok(CommandOutcome::Completed)
}

fn report_service_result(style: OutputStyle, result: &ServiceResult) -> CommandOutcome {
    if result.is_success() {
        print_status(style, "ok", result.message());
        CommandOutcome::Completed
    } else {
        eprint_status(style, "error", result.message());
        CommandOutcome::Failed
    }
}

pub(crate) fn format_installed_lines(installed: &[InstalledPackageRecord]) -> Vec<String> {
    if installed.is_empty() {
        return vec!["No packages installed".to_string()];
    }

    installed
        .iter()
        .map(|record| {
            let mut line = format!("{} {}", record.id, record.version);
            if let Some(deployment_type) = record.deployment_type {
                line.push_str(&format!(" ({deployment_type})"));
            }
            if let Some(folder) = &record.folder {
                line.push_str(&format!(" {}", folder.display()));
            }
            line
        })
        .collect()
}

pub(crate) fn format_repository_lines(repositories: &[RepositoryRecord]) -> Vec<String> {
    if repositories.is_empty() {
        return vec!["No repositories configured".to_string()];
    }

    repositories
        .iter()
        .map(|repository| {
            let state = if repository.enabled {
                "enabled"
            } else {
                "disabled"
            };
            format!(
                "{} {} priority={} {state}",
                repository.name, repository.url, repository.priority
            )
        })
        .collect()
}

pub(crate) fn format_doctor_lines(
    context: &DeployContext,
    repositories: &[RepositoryRecord],
    installed_count: usize,
) -> Vec<String> {
    let layout = &context.layout;
    let host = &context.settings.script_host;
    let enabled = repositories
        .iter()
        .filter(|repository| repository.enabled)
        .count();
    let mut script_host = host.program.clone();
    for arg in &host.args {
        script_host.push(' ');
        script_host.push_str(arg);
    }

    vec![
        format!("prefix: {}", layout.prefix().display()),
        format!("target root: {}", context.target_root().display()),
        format!("state: {}", layout.state_dir().display()),
        format!("cache: {}", layout.package_cache_dir().display()),
        format!("config: {}", layout.config_path().display()),
        format!("script host: {script_host}"),
        format!(
            "repositories: {} configured, {enabled} enabled",
            repositories.len()
        ),
        format!("installed packages: {installed_count}"),
    ]
}
