//! 从文件名中提取拍摄日期
//!
//! 手机相机的默认命名形如 `PXL_20240423_084532187.jpg`：
//! 大写前缀、下划线、8 位日期、下划线、至少 6 位的时间/序号，之后任意字符，最后是扩展名。

use regex::Regex;
use std::sync::OnceLock;

/// 只匹配文件名开头，扩展名之后的内容不做限制
const FILENAME_DATE_PATTERN: &str =
    r"^[A-Z]+_([0-9]{4})([0-9]{2})[0-9]{2}_[0-9]{6}[0-9]*.*\.[0-9A-Za-z_]{3}";

fn filename_date_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(FILENAME_DATE_PATTERN).expect("文件名日期正则无效"))
}

/// 拍摄年月（原样保留文件名中的数字，不做日历校验）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureDate {
    pub year: String,
    pub month: String,
}

impl CaptureDate {
    /// 归档子目录名 `YYYY-MM`
    pub fn bucket(&self) -> String {
        format!("{}-{}", self.year, self.month)
    }
}

/// 尝试从文件名提取年月，不符合命名规则时返回 None
pub fn extract_date(filename: &str) -> Option<CaptureDate> {
    let caps = filename_date_regex().captures(filename)?;
    Some(CaptureDate {
        year: caps.get(1)?.as_str().to_string(),
        month: caps.get(2)?.as_str().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_filename() {
        let date = extract_date("PXL_20240423_084532187.jpg").unwrap();
        assert_eq!(date.year, "2024");
        assert_eq!(date.month, "04");
        assert_eq!(date.bucket(), "2024-04");
    }

    #[test]
    fn test_no_date_suffix() {
        assert_eq!(extract_date("IMG_001.jpg"), None);
        assert_eq!(extract_date("a.jpg"), None);
        assert_eq!(extract_date(""), None);
    }

    #[test]
    fn test_invalid_month_is_kept_verbatim() {
        let date = extract_date("ABC_20231301_999999.jpg").unwrap();
        assert_eq!(date.year, "2023");
        assert_eq!(date.month, "13");
    }

    #[test]
    fn test_prefix_match_allows_trailing_text() {
        let date = extract_date("PXL_20231105_120000123.MP.jpg").unwrap();
        assert_eq!(date.bucket(), "2023-11");

        let date = extract_date("IMG_20220102_030405~2.jpg").unwrap();
        assert_eq!(date.bucket(), "2022-01");

        assert!(extract_date("VID_20240101_101010.mp4.bak").is_some());
    }

    #[test]
    fn test_rejects_non_conforming_names() {
        // 前缀必须是大写字母
        assert_eq!(extract_date("pxl_20240423_084532187.jpg"), None);
        // 必须从开头匹配
        assert_eq!(extract_date("copy PXL_20240423_084532187.jpg"), None);
        // 时间字段不足 6 位
        assert_eq!(extract_date("PXL_20240423_08453.jpg"), None);
        // 缺少扩展名
        assert_eq!(extract_date("PXL_20240423_084532187"), None);
    }
}
