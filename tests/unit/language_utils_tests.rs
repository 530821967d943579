/*!
 * Tests for language utility functions
 */

use sublate::language_utils::{
    LanguageCodeType, get_language_name, normalize_to_part2t, validate_language_code,
};

/// Test validation of language codes
#[test]
fn test_validate_language_code_withValidCodes_shouldReturnCorrectType() {
    // ISO 639-1
    assert!(matches!(validate_language_code("en").unwrap(), LanguageCodeType::Part1));
    assert!(matches!(validate_language_code("vi").unwrap(), LanguageCodeType::Part1));
    assert!(matches!(validate_language_code("fr").unwrap(), LanguageCodeType::Part1));

    // ISO 639-2/T
    assert!(matches!(validate_language_code("eng").unwrap(), LanguageCodeType::Part2T));
    assert!(matches!(validate_language_code("vie").unwrap(), LanguageCodeType::Part2T));
    assert!(matches!(validate_language_code("fra").unwrap(), LanguageCodeType::Part2T));

    // ISO 639-2/B
    assert!(matches!(validate_language_code("fre").unwrap(), LanguageCodeType::Part2B));
    assert!(matches!(validate_language_code("ger").unwrap(), LanguageCodeType::Part2B));

    // Whitespace and case
    assert!(matches!(validate_language_code(" EN ").unwrap(), LanguageCodeType::Part1));
    assert!(matches!(validate_language_code("ENG").unwrap(), LanguageCodeType::Part2T));

    // Invalid codes
    assert!(validate_language_code("xyz").is_err());
    assert!(validate_language_code("123").is_err());
    assert!(validate_language_code("e").is_err());
    assert!(validate_language_code("").is_err());
}

/// Test normalization of language codes to ISO 639-2/T format
#[test]
fn test_normalize_to_part2t_withValidCodes_shouldNormalizeCorrectly() {
    assert_eq!(normalize_to_part2t("en").unwrap(), "eng");
    assert_eq!(normalize_to_part2t("vi").unwrap(), "vie");
    assert_eq!(normalize_to_part2t("eng").unwrap(), "eng");
    assert_eq!(normalize_to_part2t("vie").unwrap(), "vie");

    // Bibliographic forms map onto their terminological twin
    assert_eq!(normalize_to_part2t("fre").unwrap(), "fra");
    assert_eq!(normalize_to_part2t("ger").unwrap(), "deu");
    assert_eq!(normalize_to_part2t("dut").unwrap(), "nld");
    assert_eq!(normalize_to_part2t("chi").unwrap(), "zho");

    // Case insensitivity and whitespace
    assert_eq!(normalize_to_part2t("EN").unwrap(), "eng");
    assert_eq!(normalize_to_part2t("FRE").unwrap(), "fra");
    assert_eq!(normalize_to_part2t(" en ").unwrap(), "eng");

    assert!(normalize_to_part2t("xyz").is_err());
}

/// Test retrieval of language names from codes
#[test]
fn test_get_language_name_withValidCodes_shouldReturnCorrectName() {
    assert_eq!(get_language_name("en").unwrap(), "English");
    assert_eq!(get_language_name("eng").unwrap(), "English");
    assert_eq!(get_language_name("vi").unwrap(), "Vietnamese");
    assert_eq!(get_language_name("vie").unwrap(), "Vietnamese");
    assert_eq!(get_language_name("fr").unwrap(), "French");
    assert_eq!(get_language_name("fre").unwrap(), "French");

    assert!(get_language_name("xyz").is_err());
}

/// Test that validation errors carry the offending code
#[test]
fn test_validate_language_code_withInvalidCode_shouldNameItInError() {
    let error = validate_language_code("qqq").unwrap_err();
    assert!(error.to_string().contains("qqq"));

    let error = normalize_to_part2t("qqq").unwrap_err();
    assert!(error.to_string().contains("qqq"));
}
