use std::sync::Arc;

use cirrus_parse::parse_str;
use cirrus_solver::DirectiveCache;
use pretty_assertions::assert_eq;

const SRC: &str = r#"//# moduleId = network
// shared networking

const a = 1;

//@resource bucket
//# transform = zip
export const b = 2;

/*# callable = ignored */
function handler() {}
"#;

#[test]
fn statement_directives() {
    let file = parse_str("net.ts", SRC).expect("parse ok");
    let cache = DirectiveCache::new();

    let b = cache.directives_for(&file, &file.stmts[1]).expect("directives on b");
    assert_eq!(b.resource(), Some("bucket"));
    assert_eq!(b.transform(), Some("zip"));
    let pairs: Vec<(&str, &str)> = b.iter().collect();
    assert_eq!(pairs, vec![("resource", "bucket"), ("transform", "zip")]);

    assert!(cache.directives_for(&file, &file.stmts[2]).is_none());
}

#[test]
fn file_directives_come_from_the_header() {
    let file = parse_str("net.ts", SRC).expect("parse ok");
    let cache = DirectiveCache::new();
    let header = cache.file_directives(&file).expect("file directives");
    assert_eq!(header.module_id(), Some("network"));
    assert_eq!(header.len(), 1);
}

#[test]
fn lookups_are_memoized() {
    let file = parse_str("net.ts", SRC).expect("parse ok");
    let cache = DirectiveCache::new();
    let first = cache.directives_for(&file, &file.stmts[1]).expect("directives");
    let second = cache.directives_for(&file, &file.stmts[1]).expect("directives");
    assert!(Arc::ptr_eq(&first, &second));

    // Misses are cached as well.
    cache.directives_for(&file, &file.stmts[2]);
    assert_eq!(cache.len(), 2);
}

#[test]
fn files_do_not_share_entries() {
    let one = parse_str("one.ts", "//# moduleId = one\nconst a = 1;").expect("parse ok");
    let two = parse_str("two.ts", "//# moduleId = two\nconst a = 1;").expect("parse ok");
    let cache = DirectiveCache::new();
    let ids: Vec<Option<String>> = [&one, &two]
        .iter()
        .map(|file| {
            cache
                .file_directives(file)
                .and_then(|d| d.module_id().map(str::to_string))
        })
        .collect();
    assert_eq!(ids, vec![Some("one".to_string()), Some("two".to_string())]);
}

#[test]
fn cache_is_shared_across_threads() {
    let file = parse_str("net.ts", SRC).expect("parse ok");
    let cache = DirectiveCache::new();
    std::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                let d = cache.directives_for(&file, &file.stmts[1]).expect("directives");
                assert_eq!(d.resource(), Some("bucket"));
            });
        }
    });
    assert_eq!(cache.len(), 1);
}

#[test]
fn directives_serialize_as_a_map() {
    let file = parse_str("net.ts", SRC).expect("parse ok");
    let cache = DirectiveCache::new();
    let b = cache.directives_for(&file, &file.stmts[1]).expect("directives");
    let json = serde_json::to_string(&*b).expect("serialize");
    assert_eq!(json, r#"{"resource":"bucket","transform":"zip"}"#);
}
