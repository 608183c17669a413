//! upsmon NOTIFYCMD 参数解析
//!
//! upsmon 及各种包装脚本调用通知命令的方式并不统一：
//! - 标准形式：`upsm notify ups@localhost ONBATT`（两个参数，顺序不固定）
//! - 句子形式：`upsm notify "UPS ups@localhost on battery"`（整句消息，设备标识在任意位置）

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 参数解析错误
#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    /// 找不到 `<ups>@<host>` 形式的设备标识
    #[error("malformed notification: no <ups>@<host> identifier in {0:?}")]
    MalformedInput(String),
}

/// 调用形式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationForm {
    /// 设备标识 + 规范代码
    Standard,
    /// 自由文本消息
    Sentence,
}

/// 解析后的通知
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedNotification {
    /// 设备标识（`ups@host`），解析成功时非空
    pub ups_id: String,
    /// 标准形式下是大写代码，句子形式下是完整原文
    pub event_code: Option<String>,
    /// 调用形式
    pub form: NotificationForm,
    /// 去掉设备标识后的剩余文本（句子形式用于分类）
    pub residual: String,
}

impl ParsedNotification {
    /// 存入事件的原始消息
    pub fn raw_message(&self) -> String {
        match self.form {
            NotificationForm::Standard => format!(
                "{} {}",
                self.ups_id,
                self.event_code.as_deref().unwrap_or_default()
            ),
            NotificationForm::Sentence => self.event_code.clone().unwrap_or_default(),
        }
    }

    /// 设备标识中的 host 部分（去掉端口）
    pub fn host(&self) -> Option<&str> {
        let (_, host) = self.ups_id.split_once('@')?;
        if host.starts_with('[') {
            // [::1]:3493
            return host.split(']').next().map(|h| h.trim_start_matches('['));
        }
        match host.rsplit_once(':') {
            Some((h, port)) if port.chars().all(|c| c.is_ascii_digit()) && !h.contains(':') => {
                Some(h)
            }
            _ => Some(host),
        }
    }
}

/// 通知参数解析器
pub struct ArgumentParser {
    /// 完整的设备 token（标准形式）
    device_token: Regex,
    /// 裸事件代码
    bare_code: Regex,
    /// 句子中的设备标识
    embedded_device: Regex,
}

impl ArgumentParser {
    pub fn new() -> Self {
        Self {
            device_token: Regex::new(r"^[\w.\-]+@[\w.\-\[\]:]+$").expect("device token pattern is valid"),
            bare_code: Regex::new(r"^[A-Za-z_]+$").expect("code pattern is valid"),
            embedded_device: Regex::new(r"[\w.\-]+@(?:\[[0-9A-Fa-f:]+\]|[\w.\-]+)(?::\d+)?")
                .expect("embedded device pattern is valid"),
        }
    }

    /// 解析参数，顺序无关
    pub fn parse<S: AsRef<str>>(&self, args: &[S]) -> Result<ParsedNotification, ParseError> {
        let tokens: Vec<&str> = args
            .iter()
            .map(|a| a.as_ref().trim())
            .filter(|a| !a.is_empty())
            .collect();

        if let Some(parsed) = self.parse_standard(&tokens) {
            return Ok(parsed);
        }

        let text = tokens.join(" ");
        let device = self
            .embedded_device
            .find(&text)
            .ok_or_else(|| ParseError::MalformedInput(text.clone()))?;

        let ups_id = device.as_str().to_string();
        let residual = format!("{} {}", &text[..device.start()], &text[device.end()..]);
        let residual = residual
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .trim_start_matches(':')
            .trim()
            .to_string();

        Ok(ParsedNotification {
            ups_id,
            event_code: Some(text),
            form: NotificationForm::Sentence,
            residual,
        })
    }

    /// 两个 token：一个 `ups@host`，一个裸代码
    fn parse_standard(&self, tokens: &[&str]) -> Option<ParsedNotification> {
        let [a, b] = tokens else {
            return None;
        };

        let (device, code) = if self.device_token.is_match(a) && self.bare_code.is_match(b) {
            (*a, *b)
        } else if self.device_token.is_match(b) && self.bare_code.is_match(a) {
            (*b, *a)
        } else {
            return None;
        };

        let code = code.to_ascii_uppercase();
        Some(ParsedNotification {
            ups_id: device.to_string(),
            residual: code.clone(),
            event_code: Some(code),
            form: NotificationForm::Standard,
        })
    }
}

impl Default for ArgumentParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_standard_form() {
        let parser = ArgumentParser::new();
        let parsed = parser.parse(&["ups@localhost", "ONBATT"]).unwrap();
        assert_eq!(parsed.ups_id, "ups@localhost");
        assert_eq!(parsed.event_code.as_deref(), Some("ONBATT"));
        assert_eq!(parsed.form, NotificationForm::Standard);
    }

    #[test]
    fn test_parse_standard_form_any_order() {
        let parser = ArgumentParser::new();
        let parsed = parser.parse(&["onbatt", "ups@localhost"]).unwrap();
        assert_eq!(parsed.ups_id, "ups@localhost");
        assert_eq!(parsed.event_code.as_deref(), Some("ONBATT"));
    }

    #[test]
    fn test_parse_sentence_form() {
        let parser = ArgumentParser::new();
        let parsed = parser
            .parse(&["Communications with UPS ups@127.0.0.1 lost"])
            .unwrap();
        assert_eq!(parsed.ups_id, "ups@127.0.0.1");
        assert_eq!(
            parsed.event_code.as_deref(),
            Some("Communications with UPS ups@127.0.0.1 lost")
        );
        assert_eq!(parsed.form, NotificationForm::Sentence);
        assert_eq!(parsed.residual, "Communications with UPS lost");
    }

    #[test]
    fn test_parse_sentence_split_across_args() {
        let parser = ArgumentParser::new();
        let parsed = parser.parse(&["UPS", "ups@localhost", "on", "battery"]).unwrap();
        assert_eq!(parsed.ups_id, "ups@localhost");
        assert_eq!(parsed.residual, "UPS on battery");
    }

    #[test]
    fn test_parse_trailing_colon_not_part_of_device() {
        let parser = ArgumentParser::new();
        let parsed = parser.parse(&["UPS ups@localhost: on line power"]).unwrap();
        assert_eq!(parsed.ups_id, "ups@localhost");
    }

    #[test]
    fn test_parse_first_device_wins() {
        let parser = ArgumentParser::new();
        let parsed = parser
            .parse(&["UPS a@host1 and b@host2 on battery"])
            .unwrap();
        assert_eq!(parsed.ups_id, "a@host1");
    }

    #[test]
    fn test_parse_without_device_is_malformed() {
        let parser = ArgumentParser::new();
        let err = parser.parse(&["no device token here"]).unwrap_err();
        assert!(matches!(err, ParseError::MalformedInput(_)));

        let empty: [&str; 0] = [];
        assert!(parser.parse(&empty).is_err());
    }

    #[test]
    fn test_host_extraction() {
        let parser = ArgumentParser::new();
        let parsed = parser.parse(&["ups@192.168.1.5:3493", "OB"]).unwrap();
        assert_eq!(parsed.host(), Some("192.168.1.5"));

        let parsed = parser.parse(&["ups@localhost", "OL"]).unwrap();
        assert_eq!(parsed.host(), Some("localhost"));
    }
}
