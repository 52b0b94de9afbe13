/// Version stamped by build.rs: env override, then `git describe`, then "dev".
pub const GIT_VERSION: &str = env!("GIT_VERSION");
