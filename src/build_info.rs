use std::fmt;

/// What `--build-info` reports about this binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInfo<'a> {
    pub name: &'a str,
    pub version: &'static str,
    pub git_describe: &'static str,
    pub git_hash: &'static str,
    pub backend: &'static str,
    pub profiling: bool,
}

impl<'a> BuildInfo<'a> {
    pub fn current(name: &'a str) -> Self {
        BuildInfo {
            name,
            version: env!("CARGO_PKG_VERSION"),
            git_describe: env!("GIT_DESCRIBE"),
            git_hash: env!("GIT_HASH"),
            backend: if cfg!(feature = "mpi") { "mpi" } else { "channels" },
            profiling: cfg!(feature = "profile-with-puffin"),
        }
    }
}

/// One flat JSON object.
impl fmt::Display for BuildInfo<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{{")?;
        writeln!(f, "  \"name\": {:?},", self.name)?;
        writeln!(f, "  \"version\": {:?},", self.version)?;
        writeln!(f, "  \"git_describe\": {:?},", self.git_describe)?;
        writeln!(f, "  \"git_hash\": {:?},", self.git_hash)?;
        writeln!(f, "  \"backend\": {:?},", self.backend)?;
        writeln!(f, "  \"profiling\": {}", self.profiling)?;
        write!(f, "}}")
    }
}

pub fn print_report(name: &str) {
    println!("{}", BuildInfo::current(name));
}
