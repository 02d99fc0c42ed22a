//! 규칙 파일 로더 -- YAML 규칙 파일을 디스크에서 로드합니다.
//!
//! 규칙 디렉토리 내의 `.yml`/`.yaml` 파일을 파일명 순으로 스캔하고 컴파일합니다.
//! 개별 파일 로딩/검증 실패는 경고 로그를 남기고 건너뜁니다.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use logferry_core::pipeline::LineRule;

use crate::error::LogShipperError;
use crate::parser::PatternRule;

use super::types::RuleDefinition;

/// 규칙 파일 최대 크기
const MAX_RULE_FILE_SIZE: u64 = 1024 * 1024; // 1MB
/// 디렉토리당 최대 규칙 수
const MAX_RULES_COUNT: usize = 1_000;

/// 규칙 파일 로더
pub struct RuleLoader;

impl RuleLoader {
    /// 디렉토리에서 모든 YAML 규칙 파일을 로드합니다.
    ///
    /// 비활성화된 규칙은 제외되고, 먼저 로드된 규칙과 ID가 겹치면 건너뜁니다.
    ///
    /// # Errors
    /// - 디렉토리를 읽을 수 없는 경우
    /// - 규칙 수가 `MAX_RULES_COUNT`를 초과하는 경우
    pub async fn load_directory(
        dir: impl AsRef<Path>,
    ) -> Result<Vec<PatternRule>, LogShipperError> {
        let dir = dir.as_ref();
        let paths = Self::rule_paths(dir).await?;

        let mut rules = Vec::new();
        let mut seen_ids = HashSet::new();

        for path in paths {
            let definition = match Self::load_file(&path).await {
                Ok(definition) => definition,
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "failed to load rule file, skipping"
                    );
                    continue;
                }
            };

            if !definition.enabled {
                tracing::debug!(rule_id = %definition.id, "rule disabled, skipping");
                continue;
            }

            let rule = match definition.compile() {
                Ok(rule) => rule,
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "invalid rule, skipping"
                    );
                    continue;
                }
            };

            if !seen_ids.insert(rule.id().to_owned()) {
                tracing::warn!(
                    rule_id = %rule.id(),
                    path = %path.display(),
                    "duplicate rule id, skipping"
                );
                continue;
            }

            tracing::debug!(
                rule_id = %rule.id(),
                pattern = %rule.pattern(),
                "rule compiled"
            );
            rules.push(rule);

            if rules.len() > MAX_RULES_COUNT {
                return Err(LogShipperError::RuleLoad {
                    path: dir.display().to_string(),
                    reason: format!("too many rules: max {MAX_RULES_COUNT}"),
                });
            }
        }

        tracing::info!(
            dir = %dir.display(),
            count = rules.len(),
            "loaded extraction rules"
        );

        Ok(rules)
    }

    /// 디렉토리의 YAML 파일 경로를 정렬하여 반환합니다.
    async fn rule_paths(dir: &Path) -> Result<Vec<PathBuf>, LogShipperError> {
        let mut entries =
            tokio::fs::read_dir(dir)
                .await
                .map_err(|e| LogShipperError::RuleLoad {
                    path: dir.display().to_string(),
                    reason: format!("failed to read directory: {e}"),
                })?;

        let mut paths = Vec::new();
        while let Some(entry) =
            entries
                .next_entry()
                .await
                .map_err(|e| LogShipperError::RuleLoad {
                    path: dir.display().to_string(),
                    reason: format!("failed to read directory entry: {e}"),
                })?
        {
            let path = entry.path();
            let is_yaml = path
                .extension()
                .is_some_and(|ext| ext == "yml" || ext == "yaml");
            if is_yaml {
                paths.push(path);
            }
        }

        paths.sort();
        Ok(paths)
    }

    /// 단일 YAML 파일에서 규칙 정의를 로드합니다.
    pub async fn load_file(path: impl AsRef<Path>) -> Result<RuleDefinition, LogShipperError> {
        let path = path.as_ref();

        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| LogShipperError::RuleLoad {
                path: path.display().to_string(),
                reason: format!("failed to read file metadata: {e}"),
            })?;

        if metadata.len() > MAX_RULE_FILE_SIZE {
            return Err(LogShipperError::RuleLoad {
                path: path.display().to_string(),
                reason: format!(
                    "file too large: {} bytes (max: {MAX_RULE_FILE_SIZE})",
                    metadata.len()
                ),
            });
        }

        let content =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|e| LogShipperError::RuleLoad {
                    path: path.display().to_string(),
                    reason: format!("failed to read file: {e}"),
                })?;

        Self::parse_yaml(&content, &path.display().to_string())
    }

    /// YAML 문자열을 파싱하여 규칙 정의를 생성합니다.
    pub fn parse_yaml(yaml_str: &str, source: &str) -> Result<RuleDefinition, LogShipperError> {
        let definition: RuleDefinition =
            serde_yaml::from_str(yaml_str).map_err(|e| LogShipperError::RuleLoad {
                path: source.to_owned(),
                reason: format!("YAML parse error: {e}"),
            })?;

        definition.validate()?;

        Ok(definition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GATEWAY_RULE: &str = r#"
id: gateway
program: Gateway
priority: 50
pattern: '^gw (?P<level>\w) (?P<message>.*)$'
"#;

    fn write(dir: &Path, name: &str, content: &str) {
        std::fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn parse_valid_yaml() {
        let rule = RuleLoader::parse_yaml(GATEWAY_RULE, "gateway.yml").unwrap();
        assert_eq!(rule.id, "gateway");
        assert_eq!(rule.program, "Gateway");
        assert_eq!(rule.priority, 50);
    }

    #[test]
    fn parse_invalid_yaml_returns_error() {
        let result = RuleLoader::parse_yaml("not: [valid: yaml: {{{", "bad.yml");
        assert!(matches!(result, Err(LogShipperError::RuleLoad { .. })));
    }

    #[test]
    fn parse_yaml_with_empty_id_returns_error() {
        let yaml = "id: ''\nprogram: X\npattern: 'x'\n";
        let result = RuleLoader::parse_yaml(yaml, "empty_id.yml");
        assert!(matches!(result, Err(LogShipperError::RuleValidation { .. })));
    }

    #[tokio::test]
    async fn load_nonexistent_directory_returns_error() {
        let result = RuleLoader::load_directory("/nonexistent/path/rules").await;
        assert!(matches!(result, Err(LogShipperError::RuleLoad { .. })));
    }

    #[tokio::test]
    async fn load_directory_skips_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "01-gateway.yml", GATEWAY_RULE);
        write(dir.path(), "02-broken.yaml", "id: [oops");
        write(
            dir.path(),
            "03-bad-regex.yml",
            "id: bad\nprogram: X\npattern: '(unclosed'\n",
        );
        write(dir.path(), "notes.txt", "id: ignored\nprogram: X\npattern: x\n");

        let rules = RuleLoader::load_directory(dir.path()).await.unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].id(), "gateway");
    }

    #[tokio::test]
    async fn load_directory_skips_duplicate_ids() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.yml", GATEWAY_RULE);
        write(
            dir.path(),
            "b.yml",
            "id: gateway\nprogram: Other\npattern: 'other'\n",
        );

        let rules = RuleLoader::load_directory(dir.path()).await.unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].program(), "Gateway");
    }

    #[tokio::test]
    async fn load_directory_skips_disabled_rules() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "off.yml",
            "id: off\nprogram: X\npattern: 'x'\nenabled: false\n",
        );

        let rules = RuleLoader::load_directory(dir.path()).await.unwrap();
        assert!(rules.is_empty());
    }

    #[tokio::test]
    async fn oversized_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let big = format!(
            "id: big\nprogram: X\npattern: 'x'\n# {}\n",
            "a".repeat(MAX_RULE_FILE_SIZE as usize)
        );
        write(dir.path(), "big.yml", &big);

        let result = RuleLoader::load_file(dir.path().join("big.yml")).await;
        assert!(matches!(result, Err(LogShipperError::RuleLoad { .. })));
    }

    #[tokio::test]
    async fn too_many_rules_is_error() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..=MAX_RULES_COUNT {
            write(
                dir.path(),
                &format!("rule-{i:04}.yml"),
                &format!("id: r{i}\nprogram: X\npattern: 'r{i}'\n"),
            );
        }

        let result = RuleLoader::load_directory(dir.path()).await;
        assert!(matches!(result, Err(LogShipperError::RuleLoad { .. })));
    }
}
