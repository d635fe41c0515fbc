mod decision;
mod extract;
mod fs;
mod install;
mod installed;
mod layout;
mod script;
mod settings;
mod transform;
mod uninstall;

pub use decision::InstallDecision;
pub use extract::{ExtractedPackageInfo, PackageExtractor};
pub use fs::{remove_file_if_exists, FileSystem, LocalFileSystem};
pub use install::{InstallRequest, Installer, InstallerServices};
pub use installed::{
    current_unix_timestamp, FileRegistry, InstalledPackageRecord, InstalledPackageRegistry,
    InstalledPackageSet, MemoryRegistry,
};
pub use layout::{absolute_path, default_user_prefix, DeployLayout, PREFIX_ENV_VAR};
pub use script::{
    ProcessScriptExecutor, ScriptExecutor, ScriptHost, INSTALL_SCRIPT_NAME, UNINSTALL_SCRIPT_NAME,
};
pub use settings::Settings;
pub use transform::{
    substitute_tokens, ConfigFileTransform, SystemSettingsTransform, TransformService,
    SYSTEM_SETTINGS_FILE_NAME, TEMPLATE_SUFFIX,
};
pub use uninstall::Uninstaller;
