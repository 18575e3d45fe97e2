//! Post-response safety filtering.
//!
//! Second layer of a two-layer defense: the system instruction already
//! forbids corporal-punishment advice, and the model usually mentions
//! these words only to explain what *not* to do. Deleting or rewriting
//! on keyword hits would mangle exactly those good answers, so the
//! filter is append-only: the original text is kept and a fixed
//! reminder is attached after a separator. Recall over precision.

use std::borrow::Cow;

/// Corporal-punishment / verbal-violence vocabulary. Matched as plain
/// substrings, case-sensitive as authored, no tokenization.
const SENSITIVE_TERMS: &[&str] = &[
    "打", "骂", "揍", "体罚", "关禁闭", "罚站", "罚跪",
    "暴力", "殴打", "掌掴", "用力", "狠狠", "教训",
];

/// The fixed remediation block appended after a hit.
const SAFETY_REMINDER: &str = "\n\n---\n\n⚠️ **安全提醒**：\n\n我们坚持：任何形式的体罚或语言暴力都不应该被使用。如果上述回答中涉及相关词汇，仅为说明错误做法，请勿模仿。\n\n正确的教育方式应该是：\n• 非暴力沟通\n• 尊重孩子的人格和尊严\n• 用温和而坚定的态度设立界限\n\n如情况复杂，建议寻求专业心理咨询师帮助。";

/// Whether `text` contains any sensitive term.
pub fn contains_sensitive(text: &str) -> bool {
    SENSITIVE_TERMS.iter().any(|term| text.contains(term))
}

/// Append the safety reminder when `reply` contains a sensitive term;
/// otherwise return the input unchanged (borrowed, no allocation).
pub fn apply(reply: &str) -> Cow<'_, str> {
    if contains_sensitive(reply) {
        let mut out = String::with_capacity(reply.len() + SAFETY_REMINDER.len());
        out.push_str(reply);
        out.push_str(SAFETY_REMINDER);
        Cow::Owned(out)
    } else {
        Cow::Borrowed(reply)
    }
}
