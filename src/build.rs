//! 构建上下文 - 由外部 CI 系统在每次构建事件时提供
//!
//! 这里只描述数据，不做任何 I/O。`BuildContext` 每个事件新建一次，处理完即丢弃。

use serde::{Deserialize, Serialize};

/// 构建结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Started,
    Success,
    Failure,
    Unstable,
    Aborted,
    NotBuilt,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Started => "STARTED",
            Outcome::Success => "SUCCESS",
            Outcome::Failure => "FAILURE",
            Outcome::Unstable => "UNSTABLE",
            Outcome::Aborted => "ABORTED",
            Outcome::NotBuilt => "NOT_BUILT",
        }
    }

    /// 是否为失败类结果（用于判断 back to normal）
    pub fn is_broken(&self) -> bool {
        matches!(self, Outcome::Failure | Outcome::Unstable)
    }
}

/// 单个提交条目
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommitEntry {
    pub author: String,
    pub title: String,
    #[serde(default)]
    pub paths: Vec<String>,
}

impl CommitEntry {
    pub fn new(author: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            title: title.into(),
            paths: Vec::new(),
        }
    }

    pub fn with_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.paths = paths.into_iter().map(Into::into).collect();
        self
    }
}

/// 测试结果汇总
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSummary {
    pub passed: u32,
    pub failed: u32,
    pub skipped: u32,
}

/// 构建上下文
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildContext {
    /// Job 名称
    pub job_name: String,
    /// 构建号
    pub build_number: u64,
    /// 构建 URL（可以是相对路径，会拼接 build server URL）
    #[serde(default)]
    pub url: String,
    /// 当前结果
    pub outcome: Outcome,
    /// 同一个 job 上一次完成构建的结果
    #[serde(default)]
    pub previous_outcome: Option<Outcome>,
    /// 提交列表（保持原顺序）
    #[serde(default)]
    pub commits: Vec<CommitEntry>,
    /// 触发构建的用户
    #[serde(default)]
    pub triggering_user: String,
    /// Pull request 作者
    #[serde(default)]
    pub pull_request_author: Option<String>,
    #[serde(default)]
    pub test_summary: Option<TestSummary>,
}

impl BuildContext {
    pub fn new(job_name: impl Into<String>, build_number: u64, outcome: Outcome) -> Self {
        Self {
            job_name: job_name.into(),
            build_number,
            url: String::new(),
            outcome,
            previous_outcome: None,
            commits: Vec::new(),
            triggering_user: String::new(),
            pull_request_author: None,
            test_summary: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_previous(mut self, previous: Outcome) -> Self {
        self.previous_outcome = Some(previous);
        self
    }

    pub fn with_commits(mut self, commits: Vec<CommitEntry>) -> Self {
        self.commits = commits;
        self
    }

    pub fn with_triggering_user(mut self, user: impl Into<String>) -> Self {
        self.triggering_user = user.into();
        self
    }

    pub fn with_pull_request_author(mut self, author: impl Into<String>) -> Self {
        self.pull_request_author = Some(author.into());
        self
    }

    pub fn with_test_summary(mut self, summary: TestSummary) -> Self {
        self.test_summary = Some(summary);
        self
    }
}
