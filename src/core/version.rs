use anyhow::Context;
use semver::Version;

/// 版本比较结论。`diagnostic` 携带非致命的解析告警
/// （当前版本号格式不合法时走降级比较）。
#[derive(Debug, Clone)]
pub struct Comparison {
    pub newer: bool,
    pub diagnostic: Option<String>,
}

fn parse_tolerant(s: &str) -> Result<Version, semver::Error> {
    Version::parse(s.trim().trim_start_matches('v'))
}

/// candidate 是否严格比 current 新。
///
/// current 解析失败不致命：降级为"字符串不相等即视为有更新"，并在
/// diagnostic 里带回解析错误 —— 自身版本号坏了不应让检查直接失败。
/// candidate 解析失败是硬错误：registry 给的数据不可信，不提供更新。
pub fn is_newer(current: &str, candidate: &str) -> anyhow::Result<Comparison> {
    let cand = parse_tolerant(candidate)
        .with_context(|| format!("invalid remote version {:?}", candidate))?;

    match parse_tolerant(current) {
        Ok(cur) => Ok(Comparison {
            newer: cand > cur,
            diagnostic: None,
        }),
        Err(e) => Ok(Comparison {
            newer: candidate != current,
            diagnostic: Some(format!("current version {:?} is not semver: {}", current, e)),
        }),
    }
}
