//! Document splitting and sensitive-kind filtering.
//!
//! Manifests are split on the literal `---\n` delimiter. This is not a YAML
//! multi-document parser: a delimiter followed by trailing spaces or a
//! `\r\n` line ending is not recognised and the surrounding documents stay
//! fused together. A fused fragment is classified by its first document only.

use serde::Deserialize;

/// Delimiter between documents in a manifest.
pub const DOCUMENT_DELIMITER: &str = "---\n";

/// Kind of the documents hidden from every diff.
pub const SECRET_KIND: &str = "Secret";

/// The field read from each document. Everything else is ignored.
#[derive(Debug, Default, Deserialize)]
struct DocumentHead {
    #[serde(default)]
    kind: Option<String>,
}

/// Returns the `kind` of a document, or `None` when it is absent or the
/// document does not parse.
///
/// Only the first YAML document of the fragment is decoded, so a fragment
/// holding two fused documents takes the kind of the first one.
#[must_use]
pub fn document_kind(document: &str) -> Option<String> {
    serde_yaml::Deserializer::from_str(document)
        .next()
        .and_then(|first| DocumentHead::deserialize(first).ok())
        .and_then(|head| head.kind)
}

/// Splits a manifest into its documents on the exact delimiter.
///
/// The split keeps empty fragments, so rejoining the result with
/// [`DOCUMENT_DELIMITER`] reproduces the input.
pub fn split_documents(manifest: &str) -> impl Iterator<Item = &str> {
    manifest.split(DOCUMENT_DELIMITER)
}

/// Removes every document whose kind equals `kind`, preserving the order
/// of the others.
#[must_use]
pub fn remove_kind(manifest: &str, kind: &str) -> String {
    let wanted: Vec<&str> = split_documents(manifest)
        .filter(|document| document_kind(document).as_deref() != Some(kind))
        .collect();

    wanted.join(DOCUMENT_DELIMITER)
}

/// Removes `Secret` documents from a manifest.
#[must_use]
pub fn remove_secrets(manifest: &str) -> String {
    remove_kind(manifest, SECRET_KIND)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SECRET: &str = "apiVersion: v1\nkind: Secret\ndata: {}\n";
    const CONFIG_MAP: &str = "apiVersion: v1\nkind: ConfigMap\ndata: {a: 1}\n";

    #[test]
    fn test_removes_secret_documents() {
        let manifest = format!("{SECRET}---\n{CONFIG_MAP}");
        assert_eq!(remove_secrets(&manifest), CONFIG_MAP);
    }

    #[test]
    fn test_keeps_order_of_survivors() {
        let service = "kind: Service\nmetadata: {name: web}\n";
        let manifest = format!("{CONFIG_MAP}---\n{SECRET}---\n{service}");
        assert_eq!(
            remove_secrets(&manifest),
            format!("{CONFIG_MAP}---\n{service}")
        );
    }

    #[test]
    fn test_all_documents_removed_gives_empty() {
        let manifest = format!("{SECRET}---\n{SECRET}");
        assert_eq!(remove_secrets(&manifest), "");
    }

    #[test]
    fn test_unparsable_document_is_kept() {
        let broken = "kind: [unterminated\n";
        let manifest = format!("{broken}---\n{SECRET}");
        assert_eq!(remove_secrets(&manifest), broken);
    }

    #[test]
    fn test_missing_kind_is_kept() {
        let manifest = "# Source: chart/templates/empty.yaml\n";
        assert_eq!(remove_secrets(manifest), manifest);
        assert_eq!(document_kind(manifest), None);
    }

    #[test]
    fn test_leading_delimiter_is_preserved() {
        let manifest = format!("---\n{CONFIG_MAP}---\n{SECRET}");
        assert_eq!(remove_secrets(&manifest), format!("---\n{CONFIG_MAP}"));
    }

    #[test]
    fn test_crlf_delimiter_is_not_split() {
        // Known limitation: only the exact `---\n` delimiter splits.
        let manifest = format!("{CONFIG_MAP}---\r\n{SECRET}");
        assert_eq!(split_documents(&manifest).count(), 1);
        assert_eq!(document_kind(&manifest).as_deref(), Some("ConfigMap"));
        assert_eq!(remove_secrets(&manifest), manifest);
    }

    #[test]
    fn test_fused_fragment_starting_with_secret_is_removed() {
        let secret = "apiVersion: v1\nkind: Secret\ndata: {token: czNjcjN0}\n";
        for delimiter in ["---  \n", "---\r\n"] {
            let manifest = format!("{secret}{delimiter}{CONFIG_MAP}");
            assert_eq!(split_documents(&manifest).count(), 1);
            assert_eq!(document_kind(&manifest).as_deref(), Some(SECRET_KIND));

            let filtered = remove_secrets(&manifest);
            assert!(!filtered.contains("kind: Secret"), "{delimiter:?} kept the secret");
            assert!(!filtered.contains("czNjcjN0"));
        }
    }

    #[test]
    fn test_fused_fragment_is_dropped_among_others() {
        let fused = format!("{SECRET}---  \n{CONFIG_MAP}");
        let service = "kind: Service\nmetadata: {name: web}\n";
        let manifest = format!("{service}---\n{fused}");
        assert_eq!(remove_secrets(&manifest), service);
    }

    #[test]
    fn test_other_kind_can_be_removed() {
        let manifest = format!("{SECRET}---\n{CONFIG_MAP}");
        assert_eq!(remove_kind(&manifest, "ConfigMap"), SECRET);
    }

    fn document() -> impl Strategy<Value = String> {
        ("[a-z]{1,8}", "[A-Z][a-zA-Z]{0,10}", "[a-z0-9 ]{0,12}").prop_map(|(name, kind, data)| {
            format!("apiVersion: v1\nkind: {kind}\nmetadata:\n  name: {name}\ndata: '{data}'\n")
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn filtering_without_secrets_is_identity(docs in prop::collection::vec(document(), 0..6)) {
            prop_assume!(docs.iter().all(|d| document_kind(d).as_deref() != Some(SECRET_KIND)));
            let manifest = docs.join(DOCUMENT_DELIMITER);
            prop_assert_eq!(remove_secrets(&manifest), manifest);
        }

        #[test]
        fn filtering_is_idempotent(
            docs in prop::collection::vec(document(), 0..6),
            secrets in prop::collection::vec(any::<bool>(), 6),
        ) {
            let docs: Vec<String> = docs
                .into_iter()
                .zip(secrets)
                .map(|(doc, secret)| if secret { SECRET.to_string() } else { doc })
                .collect();
            let manifest = docs.join(DOCUMENT_DELIMITER);
            let once = remove_secrets(&manifest);
            prop_assert_eq!(remove_secrets(&once), once);
        }

        #[test]
        fn split_then_join_round_trips(docs in prop::collection::vec(document(), 1..6)) {
            let manifest = docs.join(DOCUMENT_DELIMITER);
            let rejoined = split_documents(&manifest).collect::<Vec<_>>().join(DOCUMENT_DELIMITER);
            prop_assert_eq!(rejoined, manifest);
        }
    }
}
