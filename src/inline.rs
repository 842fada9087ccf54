//! Inline issue tags such as `JIRA:X-1` or `JIRA:-X-1` inside note text.
//!
//! Browser links to issues of a configured account are tags too, when URL
//! conversion is enabled: `https://jira.example.com/browse/X-1`.

use regex::Regex;
use std::ops::Range;

use crate::jira::account::Account;
use crate::search::COMPACT_SYMBOL;

/// Shape of an issue key.
pub const JIRA_KEY_PATTERN: &str = "[A-Z][A-Z0-9_]*-[0-9]+";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineTag {
  /// Byte range of the whole tag
  pub span: Range<usize>,
  pub key: String,
  pub compact: bool,
  /// Alias of the account whose URL matched, for URL tags
  pub account: Option<String>,
}

/// Finds inline tags for one prefix and set of accounts.
#[derive(Debug, Clone)]
pub struct InlineScanner {
  prefix: String,
  tag: Option<Regex>,
  url: Option<UrlPattern>,
}

#[derive(Debug, Clone)]
struct UrlPattern {
  pattern: Regex,
  /// `(host, alias)` of every account
  hosts: Vec<(String, String)>,
}

impl InlineScanner {
  /// An empty `prefix` disables prefixed tags. URLs are only recognized
  /// when `url_to_tag` is set and at least one account is given.
  pub fn new(prefix: &str, url_to_tag: bool, accounts: &[&Account]) -> Result<Self, regex::Error> {
    let tag = if prefix.is_empty() {
      None
    } else {
      Some(Regex::new(&format!(
        "{}({}?)({})",
        regex::escape(prefix),
        regex::escape(COMPACT_SYMBOL),
        JIRA_KEY_PATTERN
      ))?)
    };

    let url = if url_to_tag && !accounts.is_empty() {
      let hosts: Vec<String> = accounts
        .iter()
        .map(|account| regex::escape(&account.host))
        .collect();
      let pattern = Regex::new(&format!(
        "({}?)({})/browse/({})",
        regex::escape(COMPACT_SYMBOL),
        hosts.join("|"),
        JIRA_KEY_PATTERN
      ))?;
      let hosts = accounts
        .iter()
        .map(|account| (account.host.clone(), account.alias.clone()))
        .collect();
      Some(UrlPattern { pattern, hosts })
    } else {
      None
    };

    Ok(Self {
      prefix: prefix.to_string(),
      tag,
      url,
    })
  }

  /// Every tag in `text`, in order of appearance.
  pub fn scan(&self, text: &str) -> Vec<InlineTag> {
    let mut tags = Vec::new();

    if let Some(pattern) = &self.tag {
      for captures in pattern.captures_iter(text) {
        let (Some(whole), Some(marker), Some(key)) =
          (captures.get(0), captures.get(1), captures.get(2))
        else {
          continue;
        };
        tags.push(InlineTag {
          span: whole.range(),
          key: key.as_str().to_string(),
          compact: !marker.as_str().is_empty(),
          account: None,
        });
      }
    }

    if let Some(urls) = &self.url {
      for captures in urls.pattern.captures_iter(text) {
        let (Some(whole), Some(marker), Some(host), Some(key)) =
          (captures.get(0), captures.get(1), captures.get(2), captures.get(3))
        else {
          continue;
        };
        if tags.iter().any(|tag| tag.span.start < whole.end() && whole.start() < tag.span.end) {
          continue;
        }
        tags.push(InlineTag {
          span: whole.range(),
          key: key.as_str().to_string(),
          compact: !marker.as_str().is_empty(),
          account: urls
            .hosts
            .iter()
            .find(|(candidate, _)| candidate == host.as_str())
            .map(|(_, alias)| alias.clone()),
        });
      }
    }

    tags.sort_by_key(|tag| tag.span.start);
    tags
  }

  /// `text` with every matched issue URL replaced by a prefixed tag.
  pub fn rewrite_urls(&self, text: &str) -> String {
    let Some(urls) = &self.url else {
      return text.to_string();
    };
    let replacement = format!("{}${{1}}${{3}}", self.prefix.replace('$', "$$"));
    urls.pattern.replace_all(text, replacement.as_str()).into_owned()
  }
}
