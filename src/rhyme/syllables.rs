use super::SyllableEstimator;

/// Vowel-group counter with the usual English corrections for a silent
/// final `e` and a voiceless `-ed` suffix. Good enough for meter matching,
/// which tolerates being off by one.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicEstimator;

fn is_vowel(c: char) -> bool {
    matches!(c, 'a' | 'e' | 'i' | 'o' | 'u' | 'y')
}

impl SyllableEstimator for HeuristicEstimator {
    fn estimate(&self, word: &str) -> u32 {
        let letters: Vec<char> = word
            .chars()
            .filter(char::is_ascii_alphabetic)
            .map(|c| c.to_ascii_lowercase())
            .collect();
        if letters.is_empty() {
            return 0;
        }

        let mut groups = 0u32;
        let mut previous_vowel = false;
        for &c in &letters {
            let vowel = is_vowel(c);
            if vowel && !previous_vowel {
                groups += 1;
            }
            previous_vowel = vowel;
        }

        let n = letters.len();
        let before = |back: usize| n.checked_sub(back).map(|i| letters[i]);

        if groups > 1 {
            match (before(3), before(2), before(1)) {
                // "table", "little": the -le carries its own syllable
                (Some(c), Some('l'), Some('e')) if !is_vowel(c) => {}
                // "like", "stone"
                (_, Some(c), Some('e')) if !is_vowel(c) => groups -= 1,
                // "walked", "jumped"; "wanted" and "faded" keep theirs
                (_, Some('e'), Some('d')) if !matches!(before(3), Some('t' | 'd')) => {
                    groups -= 1
                }
                _ => {}
            }
        }

        groups.max(1)
    }
}
