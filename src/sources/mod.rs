use url::Url;

/// A streaming site whose links are ranked ahead of unknown hosts.
#[derive(Debug, Clone, PartialEq)]
pub struct TrustedSource {
    pub name: &'static str,
    pub domain: &'static str,
    pub aliases: &'static [&'static str],
    /// 1 is the most trusted.
    pub priority: u8,
    /// Path fragment that marks an actual watch page on this site.
    pub watch_path_pattern: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TrustLevel {
    Unknown,
    Domain,
    Watch,
}

pub const TRUSTED_SOURCES: &[TrustedSource] = &[
    TrustedSource {
        name: "iWaatch",
        domain: "iwaatch.com",
        aliases: &["iwaatch", "i-watch"],
        priority: 1,
        watch_path_pattern: "/view/",
    },
    TrustedSource {
        name: "WeCima",
        domain: "wecima.show",
        aliases: &["wecima", "mycima", "my-cima"],
        priority: 1,
        watch_path_pattern: "/watch/",
    },
    TrustedSource {
        name: "Cima Wbas",
        domain: "cimawbas.tv",
        aliases: &["cimawbas", "cema-w-bas"],
        priority: 1,
        watch_path_pattern: "/watch/",
    },
    TrustedSource {
        name: "Akwam",
        domain: "akwam.re",
        aliases: &["akwam", "akw.am"],
        priority: 2,
        watch_path_pattern: "/movie/",
    },
    TrustedSource {
        name: "FaselHD",
        domain: "faselhd.center",
        aliases: &["faselhd", "fasel-hd"],
        priority: 2,
        watch_path_pattern: "/movies/",
    },
    TrustedSource {
        name: "EgyBest",
        domain: "egybest.mx",
        aliases: &["egybest", "egy-best"],
        priority: 3,
        watch_path_pattern: "/movie/",
    },
];

/// Priority given to hosts outside the trusted table.
pub const UNTRUSTED_PRIORITY: u8 = u8::MAX;

impl TrustedSource {
    fn matches_host(&self, host: &str) -> bool {
        if host == self.domain || host.ends_with(&format!(".{}", self.domain)) {
            return true;
        }
        // Aliases are site names that survive TLD hopping (wecima.cc, wecima.top, ...)
        host.split('.').any(|label| self.aliases.contains(&label))
            || self
                .aliases
                .iter()
                .filter(|a| a.contains('.'))
                .any(|a| host == *a || host.ends_with(&format!(".{}", a)))
    }
}

fn normalized_host(url: &Url) -> Option<String> {
    url.host_str()
        .map(|h| h.trim_start_matches("www.").to_ascii_lowercase())
}

pub fn lookup(url: &Url) -> Option<&'static TrustedSource> {
    let host = normalized_host(url)?;
    TRUSTED_SOURCES.iter().find(|s| s.matches_host(&host))
}

pub fn trust_level(url: &Url) -> TrustLevel {
    match lookup(url) {
        Some(source) if url.path().contains(source.watch_path_pattern) => TrustLevel::Watch,
        Some(_) => TrustLevel::Domain,
        None => TrustLevel::Unknown,
    }
}

pub fn priority(url: &Url) -> u8 {
    lookup(url).map_or(UNTRUSTED_PRIORITY, |s| s.priority)
}

/// Display label for a source link: the trusted site name, else the host.
pub fn label(link: &str) -> String {
    match Url::parse(link) {
        Ok(url) => match lookup(&url) {
            Some(source) => source.name.to_string(),
            None => normalized_host(&url).unwrap_or_else(|| link.to_string()),
        },
        Err(_) => link.to_string(),
    }
}
