use mirror_fs::NormalizedPath;
use rstest::rstest;

#[rstest]
#[case("foo/bar/baz", "/foo/bar/baz")]
#[case("/foo/bar/", "/foo/bar")]
#[case("foo\\bar\\baz", "/foo/bar/baz")]
#[case("foo/bar\\baz", "/foo/bar/baz")]
#[case("//foo///bar", "/foo/bar")]
#[case("/foo/./bar", "/foo/bar")]
#[case("/foo/../bar", "/bar")]
#[case("/../../etc", "/etc")]
fn test_normalize(#[case] raw: &str, #[case] expected: &str) {
    assert_eq!(NormalizedPath::new(raw).as_str(), expected);
}

#[test]
fn test_join_paths() {
    let base = NormalizedPath::new("foo/bar");
    let joined = base.join("baz");
    assert_eq!(joined.as_str(), "/foo/bar/baz");
}

#[test]
fn test_join_onto_root() {
    let joined = NormalizedPath::root().join("f.txt");
    assert_eq!(joined.as_str(), "/f.txt");
}

#[test]
fn test_join_normalizes_segment() {
    let joined = NormalizedPath::new("/a").join("/b/");
    assert_eq!(joined.as_str(), "/a/b");
}

#[test]
fn test_parent() {
    let path = NormalizedPath::new("foo/bar/baz");
    let parent = path.parent().unwrap();
    assert_eq!(parent.as_str(), "/foo/bar");
}

#[test]
fn test_file_name() {
    let path = NormalizedPath::new("foo/bar/baz.txt");
    assert_eq!(path.file_name(), Some("baz.txt"));
    assert_eq!(NormalizedPath::root().file_name(), None);
}

#[test]
fn test_extension() {
    assert_eq!(NormalizedPath::new("/a/b.tar.gz").extension(), Some("gz"));
    assert_eq!(NormalizedPath::new("/a/.hidden").extension(), None);
}

#[test]
fn test_starts_with_is_component_wise() {
    let path = NormalizedPath::new("/movies/new/file.mkv");
    assert!(path.starts_with(&NormalizedPath::root()));
    assert!(path.starts_with(&NormalizedPath::new("/movies")));
    assert!(path.starts_with(&NormalizedPath::new("/movies/new/file.mkv")));
    assert!(!path.starts_with(&NormalizedPath::new("/movie")));
    assert!(!path.starts_with(&NormalizedPath::new("/tv")));
}

#[test]
fn test_to_native_under() {
    let base = std::path::Path::new("/srv/mirror");
    let native = NormalizedPath::new("/a/b.txt").to_native_under(base);
    assert_eq!(native, base.join("a").join("b.txt"));
    assert_eq!(NormalizedPath::root().to_native_under(base), base.to_path_buf());
}

#[test]
fn test_depth() {
    assert_eq!(NormalizedPath::root().depth(), 0);
    assert_eq!(NormalizedPath::new("/a/b/c").depth(), 3);
}

#[test]
fn test_serde_as_string() {
    #[derive(serde::Serialize, serde::Deserialize)]
    struct Wrapper {
        path: NormalizedPath,
    }

    let parsed: Wrapper = toml::from_str("path = \"a//b/\"").unwrap();
    assert_eq!(parsed.path.as_str(), "/a/b");

    let written = toml::to_string(&parsed).unwrap();
    assert!(written.contains("path = \"/a/b\""));
}
