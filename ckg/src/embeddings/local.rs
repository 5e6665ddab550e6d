pub const LOCAL_DIMENSIONS: usize = 384;
pub const LOCAL_MODEL: &str = "statistical-384";
pub const LOCAL_PROVIDER: &str = "local";

const FEATURE_SLOTS: usize = 32;

const KEYWORDS_C_FAMILY: &[&str] = &[
    "struct", "void", "int", "char", "static", "const", "sizeof", "typedef", "enum", "union",
];
const KEYWORDS_SCRIPTING: &[&str] = &[
    "function", "const", "let", "var", "def", "lambda", "async", "await", "import", "export",
    "require", "self",
];
const KEYWORDS_MANAGED: &[&str] = &[
    "class", "interface", "public", "private", "protected", "extends", "implements", "abstract",
    "override", "new",
];
const KEYWORDS_FUNCTIONAL: &[&str] = &[
    "fn", "match", "impl", "trait", "pub", "mut", "where", "type", "case", "module",
];

const CODE_MARKERS: &[&str] = &["{", "}", "=>", "->", "();", "==", "&&", "||", "::"];
const DOC_MARKERS: &[&str] = &["///", "/**", "//!", "# ", "\"\"\"", "@param", "@returns"];

/// Deterministic statistical text encoder used when no external embedding
/// provider is configured. The vector is a pure function of the input:
/// a fixed block of text-statistics features followed by hashed-token
/// frequency buckets, L2-normalized. Retrieval quality is reduced but the
/// rest of the pipeline works unchanged.
pub struct LocalEncoder;

impl LocalEncoder {
    pub fn encode(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; LOCAL_DIMENSIONS];

        let char_count = text.chars().count();
        let words: Vec<&str> = text.split_whitespace().collect();
        let word_count = words.len();
        let line_count = text.lines().count();

        let mut features = [0.0f32; FEATURE_SLOTS];
        features[0] = squash(char_count as f32 / 1000.0);
        features[1] = squash(word_count as f32 / 200.0);
        features[2] = squash(line_count as f32 / 50.0);
        features[3] = if word_count > 0 {
            squash(char_count as f32 / word_count as f32 / 10.0)
        } else {
            0.0
        };

        let (mut upper, mut digit, mut punct) = (0usize, 0usize, 0usize);
        for c in text.chars() {
            if c.is_uppercase() {
                upper += 1;
            }
            if c.is_ascii_digit() {
                digit += 1;
            }
            if c.is_ascii_punctuation() {
                punct += 1;
            }
        }
        if char_count > 0 {
            features[4] = upper as f32 / char_count as f32;
            features[5] = digit as f32 / char_count as f32;
            features[6] = punct as f32 / char_count as f32;
        }

        features[7] = marker_density(text, CODE_MARKERS);
        features[8] = marker_density(text, DOC_MARKERS);

        features[9] = keyword_density(&words, KEYWORDS_C_FAMILY);
        features[10] = keyword_density(&words, KEYWORDS_SCRIPTING);
        features[11] = keyword_density(&words, KEYWORDS_MANAGED);
        features[12] = keyword_density(&words, KEYWORDS_FUNCTIONAL);

        let (mut pascal, mut camel, mut snake, mut constant) = (0usize, 0usize, 0usize, 0usize);
        for word in &words {
            if is_constant_case(word) {
                constant += 1;
            } else if is_pascal_case(word) {
                pascal += 1;
            } else if is_camel_case(word) {
                camel += 1;
            } else if is_snake_case(word) {
                snake += 1;
            }
        }
        if word_count > 0 {
            features[13] = pascal as f32 / word_count as f32;
            features[14] = camel as f32 / word_count as f32;
            features[15] = snake as f32 / word_count as f32;
            features[16] = constant as f32 / word_count as f32;
        }

        vector[..FEATURE_SLOTS].copy_from_slice(&features);

        // Remaining dimensions are hashed-token frequency buckets.
        let buckets = LOCAL_DIMENSIONS - FEATURE_SLOTS;
        for word in &words {
            let normalized = word.to_lowercase();
            let bucket = FEATURE_SLOTS + (fnv1a(normalized.as_bytes()) as usize % buckets);
            vector[bucket] += 1.0;
        }

        l2_normalize(&mut vector);
        vector
    }
}

fn squash(x: f32) -> f32 {
    x / (1.0 + x)
}

fn marker_density(text: &str, markers: &[&str]) -> f32 {
    let hits = markers
        .iter()
        .map(|m| text.matches(m).count())
        .sum::<usize>();
    squash(hits as f32 / 10.0)
}

fn keyword_density(words: &[&str], keywords: &[&str]) -> f32 {
    if words.is_empty() {
        return 0.0;
    }
    let hits = words
        .iter()
        .filter(|w| {
            let trimmed = w.trim_matches(|c: char| !c.is_alphanumeric());
            keywords.contains(&trimmed)
        })
        .count();
    hits as f32 / words.len() as f32
}

fn is_pascal_case(word: &str) -> bool {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) if first.is_uppercase() => {
            word.chars().all(|c| c.is_alphanumeric()) && chars.any(|c| c.is_lowercase())
        }
        _ => false,
    }
}

fn is_camel_case(word: &str) -> bool {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) if first.is_lowercase() => {
            word.chars().all(|c| c.is_alphanumeric()) && chars.any(|c| c.is_uppercase())
        }
        _ => false,
    }
}

fn is_snake_case(word: &str) -> bool {
    word.contains('_')
        && word
            .chars()
            .all(|c| c.is_lowercase() || c.is_ascii_digit() || c == '_')
}

fn is_constant_case(word: &str) -> bool {
    word.len() > 1
        && word.contains(|c: char| c.is_uppercase())
        && word
            .chars()
            .all(|c| c.is_uppercase() || c.is_ascii_digit() || c == '_')
}

// FNV-1a: stable across platforms, unlike the std hasher.
fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_is_deterministic() {
        let a = LocalEncoder::encode("hello world");
        let b = LocalEncoder::encode("hello world");
        assert_eq!(a, b);
    }

    #[test]
    fn encode_has_fixed_dimensions() {
        assert_eq!(LocalEncoder::encode("").len(), LOCAL_DIMENSIONS);
        assert_eq!(LocalEncoder::encode("fn main() {}").len(), LOCAL_DIMENSIONS);
    }

    #[test]
    fn encode_is_normalized() {
        let v = LocalEncoder::encode("pub fn parse(input: &str) -> Result<Ast>");
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn different_texts_differ() {
        let a = LocalEncoder::encode("class UserService extends Base");
        let b = LocalEncoder::encode("SELECT * FROM users WHERE id = 1");
        assert_ne!(a, b);
    }

    #[test]
    fn empty_text_is_zero_vector() {
        let v = LocalEncoder::encode("");
        assert!(v.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn case_pattern_helpers() {
        assert!(is_pascal_case("UserService"));
        assert!(is_camel_case("getUser"));
        assert!(is_snake_case("get_user"));
        assert!(is_constant_case("MAX_RETRIES"));
        assert!(!is_pascal_case("HTTP"));
        assert!(!is_snake_case("GetUser"));
    }
}
