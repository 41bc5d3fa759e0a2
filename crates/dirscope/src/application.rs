pub mod enumerator;
pub mod installed;

pub use enumerator::{AppEnumerator, DirectoryAppEnumerator};
pub use installed::{InstalledApp, InstalledAppsCache, InstalledAppsSnapshot, INSTALLED_APPS_KEY};
