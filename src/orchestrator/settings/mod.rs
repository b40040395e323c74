//! Configuration structures for orchestration.
//!
//! [`Config`] is immutable once built; [`Endpoints`] are derived from it a single
//! time at startup and shared by every request.

mod builder;
mod core;
mod platform;

pub use builder::ConfigBuilder;
pub use self::core::{Config, Endpoints, PackagerSettings};
pub use platform::Platform;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::error::RequestError;

    fn config() -> Config {
        ConfigBuilder::new()
            .entry(Platform::Ios, "index.ios")
            .entry(Platform::Android, "main.android")
            .build()
            .unwrap()
    }

    #[test]
    fn builder_rejects_missing_platforms() {
        assert!(ConfigBuilder::new().build().is_err());
    }

    #[test]
    fn builder_rejects_colliding_ports() {
        let result = ConfigBuilder::new()
            .entry(Platform::Ios, "index.ios")
            .packager_port(9000)
            .bundler_port(9000)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn endpoints_forward_query_to_packager_only() {
        let endpoints = Endpoints::new(&config()).unwrap();

        assert_eq!(
            endpoints.framework_code(Platform::Ios, Some("platform=ios&dev=true")),
            "http://localhost:8081/index.ios.bundle?platform=ios&dev=true"
        );
        assert_eq!(
            endpoints.framework_map(Platform::Ios, Some("platform=ios&dev=true")),
            "http://localhost:8081/index.ios.map?platform=ios&dev=true"
        );
        assert_eq!(
            endpoints.framework_code(Platform::Android, None),
            "http://localhost:8081/index.android.bundle"
        );
        assert_eq!(
            endpoints.app_code(Platform::Android),
            "http://localhost:8082/main.android.js"
        );
        assert_eq!(
            endpoints.app_map(Platform::Ios),
            "http://localhost:8082/index.ios.js.map"
        );
    }

    #[test]
    fn resolves_platform_from_query_or_entry_name() {
        let config = config();

        assert_eq!(config.resolve_platform(Some("ios"), "x").unwrap(), Platform::Ios);
        assert_eq!(
            config.resolve_platform(None, "main.android").unwrap(),
            Platform::Android
        );
        assert!(matches!(
            config.resolve_platform(Some("windows"), "index.ios"),
            Err(RequestError::UnknownPlatform(name)) if name == "windows"
        ));
        assert!(config.resolve_platform(None, "nope").is_err());
    }

    #[test]
    fn unserved_platform_is_unknown() {
        let config = ConfigBuilder::new()
            .entry(Platform::Ios, "index.ios")
            .build()
            .unwrap();
        assert!(config.resolve_platform(Some("android"), "index.android").is_err());
    }
}
