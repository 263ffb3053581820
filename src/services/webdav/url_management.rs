use reqwest::Url;
use url::form_urlencoded;

use crate::connection::{ClientHandle, Scheme};
use crate::errors::DeliveryError;

/// Root of the site shares on the instance's WebDAV servlet
pub const WEBDAV_SITES_PATH: &str = "/on/demandware.servlet/webdav/Sites";

/// URL construction for deliveries into one share of one instance.
///
/// Delivery paths are relative to the share, e.g. `/images/hero banner.jpg`.
/// Every segment is percent-encoded on its own, so reserved characters never
/// act as separators, queries or fragments. `.` and `..` segments are
/// rejected: a constructed URL always stays below the share.
#[derive(Debug, Clone)]
pub struct WebDavUrlManager {
    base_url: String,
}

impl WebDavUrlManager {
    pub fn new(scheme: Scheme, host: &str, share: &str) -> Result<Self, DeliveryError> {
        let host = host.trim().trim_end_matches('/');
        Ok(Self {
            base_url: format!("{}{}{}", scheme.prefix(), host, Self::share_path(share)?),
        })
    }

    /// URL manager for `share` on the handle's WebDAV endpoint
    pub fn for_handle(handle: &ClientHandle, share: &str) -> Result<Self, DeliveryError> {
        Self::new(handle.scheme(), handle.webdav_endpoint(), share)
    }

    /// Server path of a share, `/on/demandware.servlet/webdav/Sites/<share>`
    pub fn share_path(share: &str) -> Result<String, DeliveryError> {
        let mut path = WEBDAV_SITES_PATH.to_string();
        for segment in segments(share)? {
            path.push('/');
            path.push_str(&encode_segment(segment));
        }
        Ok(path)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Share relative path of a resource with every segment encoded
    ///
    /// Input:  "/images/hero banner.jpg"
    /// Output: "/images/hero%20banner.jpg"
    pub fn encoded_path(path: &str) -> Result<String, DeliveryError> {
        Ok(resource_segments(path)?
            .iter()
            .map(|segment| format!("/{}", encode_segment(segment)))
            .collect())
    }

    /// Full URL of the delivered resource
    pub fn target_uri(&self, path: &str) -> Result<Url, DeliveryError> {
        self.parse(format!("{}{}", self.base_url, Self::encoded_path(path)?))
    }

    /// URLs of every folder above the resource, parent first.
    ///
    /// Input:  "/a/b/c/file.jpg"
    /// Output: [".../a", ".../a/b", ".../a/b/c"]
    pub fn folder_uris(&self, path: &str) -> Result<Vec<Url>, DeliveryError> {
        let segments = resource_segments(path)?;
        let directories = match segments.split_last() {
            Some((_, directories)) => directories,
            None => &[],
        };

        let mut current = self.base_url.clone();
        directories
            .iter()
            .map(|segment| {
                current.push('/');
                current.push_str(&encode_segment(segment));
                self.parse(current.clone())
            })
            .collect()
    }

    /// Parses `uri` and checks it still addresses something inside the share
    fn parse(&self, uri: String) -> Result<Url, DeliveryError> {
        let url = parse(&uri)?;
        let base = parse(&self.base_url)?;

        let inside = url
            .path()
            .strip_prefix(base.path())
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'));
        if !inside || url.query().is_some() || url.fragment().is_some() {
            return Err(DeliveryError::InvalidPath {
                path: uri,
                reason: "resolves outside the share",
            });
        }
        Ok(url)
    }
}

fn parse(uri: &str) -> Result<Url, DeliveryError> {
    Url::parse(uri).map_err(|source| DeliveryError::InvalidUri {
        uri: uri.to_string(),
        source,
    })
}

/// Form-encodes one path segment; spaces become `%20` rather than `+`,
/// which is what WebDAV servers expect in a path
pub fn encode_segment(segment: &str) -> String {
    form_urlencoded::byte_serialize(segment.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

/// Non-empty segments of a share relative path
fn segments(path: &str) -> Result<Vec<&str>, DeliveryError> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.iter().any(|s| *s == "." || *s == "..") {
        return Err(DeliveryError::InvalidPath {
            path: path.to_string(),
            reason: "dot segments are not allowed",
        });
    }
    Ok(segments)
}

/// Segments of a resource path, which must end in a file name
fn resource_segments(path: &str) -> Result<Vec<&str>, DeliveryError> {
    let segments = segments(path)?;
    if segments.is_empty() || path.ends_with('/') {
        return Err(DeliveryError::InvalidPath {
            path: path.to_string(),
            reason: "no file name",
        });
    }
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> WebDavUrlManager {
        WebDavUrlManager::new(Scheme::Https, "dw1.example.net", "Libraries/SiteGenesis").unwrap()
    }

    fn rejected(result: Result<impl std::fmt::Debug, DeliveryError>) -> bool {
        matches!(result, Err(DeliveryError::InvalidPath { .. }))
    }

    #[test]
    fn test_base_url_includes_share() {
        assert_eq!(
            manager().base_url(),
            "https://dw1.example.net/on/demandware.servlet/webdav/Sites/Libraries/SiteGenesis"
        );
    }

    #[test]
    fn test_share_path_trims_slashes() {
        assert_eq!(
            WebDavUrlManager::share_path("/Static/").unwrap(),
            "/on/demandware.servlet/webdav/Sites/Static"
        );
        assert_eq!(WebDavUrlManager::share_path("").unwrap(), WEBDAV_SITES_PATH);
    }

    #[test]
    fn test_encode_segment() {
        assert_eq!(encode_segment("hero banner.jpg"), "hero%20banner.jpg");
        assert_eq!(encode_segment("a+b.jpg"), "a%2Bb.jpg");
        assert_eq!(encode_segment("größe.png"), "gr%C3%B6%C3%9Fe.png");
        assert_eq!(encode_segment("a&b=c?.css"), "a%26b%3Dc%3F.css");
    }

    #[test]
    fn test_target_uri_encodes_file_name() {
        let uri = manager().target_uri("/images/hero banner.jpg").unwrap();
        assert_eq!(
            uri.as_str(),
            "https://dw1.example.net/on/demandware.servlet/webdav/Sites/Libraries/SiteGenesis/images/hero%20banner.jpg"
        );
        assert!(!uri.as_str().contains('+'));
    }

    #[test]
    fn test_target_uri_for_bare_file_name() {
        let uri = manager().target_uri("robots.txt").unwrap();
        assert!(uri.as_str().ends_with("/SiteGenesis/robots.txt"));
    }

    #[test]
    fn test_folder_uris_parent_first() {
        let folders = manager().folder_uris("/a/b/c/file.jpg").unwrap();
        let paths: Vec<&str> = folders.iter().map(|u| u.path()).collect();
        let base = "/on/demandware.servlet/webdav/Sites/Libraries/SiteGenesis";
        assert_eq!(
            paths,
            vec![
                format!("{}/a", base),
                format!("{}/a/b", base),
                format!("{}/a/b/c", base),
            ]
        );
    }

    #[test]
    fn test_folder_uris_skip_empty_segments() {
        let folders = manager().folder_uris("//a//b/file.jpg").unwrap();
        assert_eq!(folders.len(), 2);
        assert!(manager().folder_uris("/file.jpg").unwrap().is_empty());
    }

    #[test]
    fn test_parent_segments_cannot_leave_the_share() {
        let manager = manager();
        assert!(rejected(manager.target_uri("/../../Impex/x.jpg")));
        assert!(rejected(manager.folder_uris("/../../Impex/x.jpg")));
        assert!(rejected(manager.target_uri("/a/../../x.jpg")));
        assert!(rejected(manager.target_uri("/a/./x.jpg")));
    }

    #[test]
    fn test_trailing_dot_segment_never_targets_the_share_root() {
        let manager = manager();
        assert!(rejected(manager.target_uri("/a/..")));
        assert!(rejected(manager.target_uri("/a/.")));
        assert!(rejected(manager.target_uri("/")));
        assert!(rejected(manager.target_uri("/images/")));
        assert!(rejected(manager.target_uri("")));
    }

    #[test]
    fn test_reserved_characters_in_directories_are_escaped() {
        let manager = manager();
        let uri = manager.target_uri("/img/a?b/x#1.jpg").unwrap();
        assert_eq!(uri.query(), None);
        assert_eq!(uri.fragment(), None);
        assert!(uri.path().ends_with("/SiteGenesis/img/a%3Fb/x%231.jpg"));

        let folders = manager.folder_uris("/img/a?b/x.jpg").unwrap();
        assert!(folders[1].path().ends_with("/img/a%3Fb"));

        let uri = manager.target_uri("/100%/..%2F/x.jpg").unwrap();
        assert!(uri.path().ends_with("/SiteGenesis/100%25/..%252F/x.jpg"));
        let uri = manager.target_uri("/a\\..\\b/x.jpg").unwrap();
        assert!(uri.path().ends_with("/SiteGenesis/a%5C..%5Cb/x.jpg"));
    }

    #[test]
    fn test_dot_segments_in_share_are_rejected() {
        assert!(rejected(WebDavUrlManager::new(Scheme::Https, "dw1.example.net", "Libraries/..")));
        assert!(rejected(WebDavUrlManager::share_path("../Impex")));
    }

    #[test]
    fn test_endpoint_with_path_prefix() {
        let manager = WebDavUrlManager::new(Scheme::Https, "dw1.example.net/proxy", "Static").unwrap();
        let uri = manager.target_uri("/css/site.css").unwrap();
        assert_eq!(
            uri.path(),
            "/proxy/on/demandware.servlet/webdav/Sites/Static/css/site.css"
        );
    }

    #[test]
    fn test_invalid_host_is_uri_error() {
        let manager = WebDavUrlManager::new(Scheme::Https, "bad host:notaport", "Static").unwrap();
        assert!(matches!(
            manager.target_uri("/x.css"),
            Err(DeliveryError::InvalidUri { .. })
        ));
    }

    #[test]
    fn test_http_scheme() {
        let manager = WebDavUrlManager::new(Scheme::Http, "127.0.0.1:8080", "Static").unwrap();
        assert_eq!(
            manager.base_url(),
            "http://127.0.0.1:8080/on/demandware.servlet/webdav/Sites/Static"
        );
    }
}
