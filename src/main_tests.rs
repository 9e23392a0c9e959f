// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `main.rs` - argument parsing and output records

#[cfg(test)]
mod tests {
    use super::super::*;
    use kubemeta::api::ApiServerFetcher;
    use kubemeta::cache::HashStore;
    use kubemeta::codec::MapEncoder;
    use kubemeta::errors::DecomposeError;
    use kubemeta::resolver::MetadataSource;
    use kubemeta::tag::TagParser;
    use tempfile::NamedTempFile;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["kubemeta"]).unwrap();

        assert!(!cli.dump_metrics);
        assert!(cli.overrides.api_url.is_none());
    }

    #[test]
    fn test_cli_flags_override_config_file() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(
            file.path(),
            "api_url: https://10.0.0.1:6443\nmetadata_section: meta\n",
        )
        .unwrap();
        let path = file.path().to_str().unwrap();

        let cli = Cli::try_parse_from([
            "kubemeta",
            "--config",
            path,
            "--api-url",
            "http://127.0.0.1:8001",
            "--dump-metrics",
        ])
        .unwrap();
        let config = load_config(&cli).unwrap();

        assert!(cli.dump_metrics);
        assert_eq!(config.api_url, "http://127.0.0.1:8001");
        assert_eq!(config.metadata_section, "meta");
    }

    #[test]
    fn test_load_config_missing_file() {
        let cli = Cli::try_parse_from(["kubemeta", "--config", "/nonexistent/kubemeta.yaml"])
            .unwrap();

        assert!(load_config(&cli).is_err());
    }

    #[test]
    fn test_output_record_success() {
        let mut encoder = MapEncoder::new(1).unwrap();
        encoder.push_str("pod_name", "web-0").unwrap();
        let result = Ok(ResolvedMetadata {
            buf: Arc::from(encoder.finish().unwrap()),
            source: MetadataSource::Cached,
        });

        let record = output_record("kube.web-0", &result);

        assert_eq!(
            record,
            json!({
                "tag": "kube.web-0",
                "source": "cached",
                "metadata": {"pod_name": "web-0"}
            })
        );
    }

    #[test]
    fn test_output_record_error() {
        let result = Err(ResolveError::from(DecomposeError::NoMatch {
            tag: "syslog".to_string(),
        }));

        let record = output_record("syslog", &result);

        assert_eq!(record["tag"], json!("syslog"));
        assert_eq!(
            record["error"],
            json!("tag 'syslog' does not match the configured pattern")
        );
        assert!(record.get("metadata").is_none());
    }

    /// Resolver whose pattern captures only a pod name, so every tag resolves locally
    fn local_resolver() -> Resolver {
        let parser = TagParser::new(r"^kube\.(?P<pod_name>[^.]+)\.log$").unwrap();
        let context = KubeContext::from_parts(
            parser,
            Arc::new(HashStore::new()),
            Arc::new(ApiServerFetcher::new(None, None)),
            "metadata",
            None,
        );
        Resolver::new(Arc::new(context))
    }

    fn records(out: &[u8]) -> Vec<Value> {
        std::str::from_utf8(out)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_process_tags_continues_after_invalid_utf8_line() {
        let resolver = local_resolver();
        let input: &[u8] = b"kube.\xff\xfe.log\nkube.web-0.log\n";
        let mut out = Vec::new();

        let (resolved, failed) = process_tags(&resolver, input, &mut out).await.unwrap();

        let records = records(&out);
        assert_eq!(records.len(), 2);
        assert!(records[0]["error"]
            .as_str()
            .unwrap()
            .starts_with("tag is not valid UTF-8"));
        assert_eq!(records[0]["tag"], json!("kube.\u{fffd}\u{fffd}.log"));
        assert_eq!(records[1]["tag"], json!("kube.web-0.log"));
        assert_eq!(records[1]["source"], json!("local"));
        assert_eq!(records[1]["metadata"], json!({"pod_name": "web-0"}));
        assert_eq!((resolved, failed), (1, 1));
    }

    #[tokio::test]
    async fn test_process_tags_skips_blank_lines_and_handles_missing_newline() {
        let resolver = local_resolver();
        let input: &[u8] = b"\n   \r\nsyslog\r\nkube.api-1.log";
        let mut out = Vec::new();

        let (resolved, failed) = process_tags(&resolver, input, &mut out).await.unwrap();

        let records = records(&out);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["tag"], json!("syslog"));
        assert!(records[0].get("error").is_some());
        assert_eq!(records[1]["metadata"], json!({"pod_name": "api-1"}));
        assert_eq!((resolved, failed), (1, 1));
    }
}
