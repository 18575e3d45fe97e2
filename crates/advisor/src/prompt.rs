//! System-instruction composition.
//!
//! `compose` is a pure mapping from (mode, age) to one instruction
//! string: a fixed persona/ethics block, a mode block, and an age-band
//! block. It performs no I/O and is total over its inputs, which makes
//! it suitable for exhaustive table-driven testing.

use nestchat_core::message::ResponseMode;

/// Persona, answer style, domains, and safety principles, identical
/// across every call.
const BASE_PROMPT: &str = "你是一位资深的儿童教育专家和家庭心理顾问。你的职责是帮助家长处理育儿过程中遇到的各种困惑和挑战。

你的回答风格：
1. 先共情：理解家长当下的情绪（焦虑、愤怒、无助），用温暖的语气先安抚他们
2. 再分析：从儿童心理学角度解释孩子行为背后的动机和原因
3. 给话术：提供具体的、可直接使用的沟通语句（\"第一句可以这样说...\"）
4. 避坑提醒：指出常见的错误做法及其后果

你的专业领域包括：
- 儿童安全教育（走丢、陌生人、网络安全等）
- 情绪管理与心理健康
- 行为习惯养成（撒谎、拖延、注意力等）
- 社交能力培养（被欺负、交友困难等）
- 道德品质教育（诚实、责任、同理心等）

重要原则：
- 绝不建议任何形式的体罚或语言暴力
- 尊重儿童的人格和尊严
- 建议要具体可操作，而非空洞的大道理
- 如果情况严重（如心理创伤、自残倾向），建议寻求专业心理咨询";

const CONCISE_BLOCK: &str = "\n\n【简洁模式】：
- 回答控制在 200-300 字以内
- 只给最核心的建议和话术
- 省略冗长的心理学原理解释";

const DETAILED_BLOCK: &str = "\n\n【详细模式】：
- 深入分析行为背后的心理动机
- 提供完整的教育方案
- 适当引用儿童心理学理论支撑";

const AGE_TODDLER: &str = "\n\n【年龄段】：0-3岁婴幼儿期，重点关注安全感建立、情绪识别、基础规则意识。语言要极简，多用具体动作指导。";
const AGE_PRESCHOOL: &str =
    "\n\n【年龄段】：3-6岁学前期，重点关注自我控制、同理心培养、社交技能。可以通过故事、游戏引导。";
const AGE_SCHOOL: &str =
    "\n\n【年龄段】：6-12岁学龄期，重点关注责任感、学习习惯、情绪管理。可以进行更多逻辑推理式沟通。";
const AGE_TEEN: &str =
    "\n\n【年龄段】：12岁以上青春期，重点关注自主性、价值观形成、同伴关系。尊重其独立性，避免说教。";

/// Build the system instruction for one request.
///
/// `child_age` of `None` or `Some(0)` omits the age-band block; ages
/// map into four disjoint bands: ≤3, 4–6, 7–12, >12.
pub fn compose(mode: ResponseMode, child_age: Option<u8>) -> String {
    let mode_block = match mode {
        ResponseMode::Concise => CONCISE_BLOCK,
        ResponseMode::Detailed => DETAILED_BLOCK,
    };

    let age_block = match child_age {
        None | Some(0) => "",
        Some(age) if age <= 3 => AGE_TODDLER,
        Some(age) if age <= 6 => AGE_PRESCHOOL,
        Some(age) if age <= 12 => AGE_SCHOOL,
        Some(_) => AGE_TEEN,
    };

    let mut prompt = String::with_capacity(BASE_PROMPT.len() + mode_block.len() + age_block.len());
    prompt.push_str(BASE_PROMPT);
    prompt.push_str(mode_block);
    prompt.push_str(age_block);
    prompt
}
