//! Prompt text and message builders.

use fortune_core::defaults::SHORT_PROVIDER;
use fortune_core::{ContentPart, Fortunes};

/// System instruction for the short reading.
pub const SYSTEM_PROMPT: &str = "\
你是一位精通传统面相学的相师，说话风趣、具体、温暖。
根据来访者的面部照片与测量数据，结合你的面相学知识给出论断。
只依据能观察到的特征下结论，不编造看不到的细节。

只输出一个 JSON 对象，不要输出任何其他文字，格式如下：
{\"face\": \"面相总评（两三句）\", \"career\": \"事业与方向建议（两三句）\", \"blessing\": \"一句祝福语\"}";

/// System instruction for the deep analysis.
pub const DEEP_ANALYSIS_PROMPT: &str = "\
你是一位精通传统面相学的相师。你会收到此前为来访者做的快速面相分析，
请在此基础上展开深度分析：分别从三停五眼、五官、气色与神态入手，
说明每项判断的依据，再综合给出事业、人际与近期运势的建议。
使用分节的纯文本输出，语气真诚具体，避免空泛套话。";

const IMAGE_INSTRUCTION: &str = "请仔细观察这位贵客的面相。";
const IMAGE_CLOSING: &str = "请根据你的面相学知识和实际观察给出具体的论断。";
const NO_IMAGE_INSTRUCTION: &str =
    "请给这位贵客相个面。（无法获取面部图像，请基于随机面相特征生成具体论断）";
const NO_CONTEXT: &str = "（无前次分析结果）";
const DEEP_PREAMBLE: &str = "以下是此前为这位来访者做的快速面相分析结果，请在此基础上展开深度分析：";

/// User content for the short reading: image plus measurements, or a
/// text-only request when no image was captured.
pub fn build_user_content(image: Option<&str>, measurements: Option<&str>) -> Vec<ContentPart> {
    match image.filter(|i| !i.is_empty()) {
        Some(image) => {
            let measure_text = measurements
                .filter(|m| !m.is_empty())
                .map(|m| format!("\n\n{}", m))
                .unwrap_or_default();
            vec![
                ContentPart::ImageUrl(image.to_string()),
                ContentPart::Text(format!(
                    "{}{}\n\n{}",
                    IMAGE_INSTRUCTION, measure_text, IMAGE_CLOSING
                )),
            ]
        }
        None => vec![ContentPart::Text(NO_IMAGE_INSTRUCTION.to_string())],
    }
}

/// Context block built from the primary provider's short reading.
pub fn build_deep_context(fortunes: &Fortunes) -> String {
    match fortunes.get(SHORT_PROVIDER).and_then(|r| r.as_ref()) {
        Some(reading) => format!(
            "【快速面相分析结果】\n面相：{}\n事业：{}\n祝语：{}",
            reading.face, reading.career, reading.blessing
        ),
        None => NO_CONTEXT.to_string(),
    }
}

/// Full user message for a deep-analysis request.
pub fn deep_user_message(fortunes: &Fortunes) -> String {
    format!("{}\n\n{}", DEEP_PREAMBLE, build_deep_context(fortunes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fortune_core::{fortunes_from_primary, ShortReading};

    #[test]
    fn test_user_content_with_image_and_measurements() {
        let parts = build_user_content(Some("data:image/jpeg;base64,AAA"), Some("眼距 0.42"));
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0], ContentPart::ImageUrl("data:image/jpeg;base64,AAA".into()));
        match &parts[1] {
            ContentPart::Text(text) => {
                assert!(text.starts_with(IMAGE_INSTRUCTION));
                assert!(text.contains("眼距 0.42"));
            }
            other => panic!("unexpected part {:?}", other),
        }
    }

    #[test]
    fn test_user_content_without_image() {
        let parts = build_user_content(None, Some("ignored"));
        assert_eq!(parts, vec![ContentPart::Text(NO_IMAGE_INSTRUCTION.into())]);
    }

    #[test]
    fn test_deep_context_uses_primary_reading() {
        let fortunes = fortunes_from_primary(ShortReading::new("A", "B", "C"));
        let context = build_deep_context(&fortunes);
        assert!(context.contains("面相：A"));
        assert!(context.contains("事业：B"));
        assert!(context.contains("祝语：C"));
        assert!(deep_user_message(&fortunes).ends_with(&context));
    }

    #[test]
    fn test_deep_context_without_primary() {
        assert_eq!(build_deep_context(&Fortunes::new()), NO_CONTEXT);
    }
}
