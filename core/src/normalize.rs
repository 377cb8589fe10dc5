use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;

lazy_static! {
    // Bullets, dashes, pipes and commas all act as list separators in pasted resumes and job posts.
    static ref DECORATION: Regex =
        Regex::new(r"[\x{2022}\x{2023}\x{25AA}\x{25AB}\x{2013}\x{2014}\x{2015}\x{25E6}\x{25CF}|,]").expect("valid regex");
    static ref BRACKETS: Regex = Regex::new(r"[\[\]{}():;]").expect("valid regex");
    static ref BOUNDARY: Regex = Regex::new(r"\n|[.,] ").expect("valid regex");
    static ref WHITESPACE: Regex = Regex::new(r"\s+").expect("valid regex");
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","all","also","am","an","and","another","any","are","aren't","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "came","can","can't","cannot","come","could","couldn't",
            "did","didn't","do","does","doesn't","doing","don't","down","during",
            "each","few","for","from","further",
            "get","got",
            "had","hadn't","has","hasn't","have","haven't","having","he","he'd","he'll","he's","her","here","here's","hers","herself","him","himself","his","how","how's",
            "i","i'd","i'll","i'm","i've","if","in","into","is","isn't","it","it's","its","itself",
            "let's","like","make","many","me","might","more","most","much","must","mustn't","my","myself",
            "never","no","nor","not","now","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
            "said","same","see","she","she'd","she'll","she's","should","shouldn't","since","so","some","still","such",
            "take","than","that","that's","the","their","theirs","them","themselves","then","there","there's","these","they","they'd","they'll","they're","they've","this","those","through","to","too",
            "under","until","up","us","very",
            "was","wasn't","way","we","we'd","we'll","we're","we've","well","were","weren't","what","what's","when","when's","where","where's","which","while","who","who's","whom","why","why's","will","with","won't","would","wouldn't",
            "you","you'd","you'll","you're","you've","your","yours","yourself","yourselves"
        ];
        words.iter().copied().collect()
    };
}

/// Case-insensitive lookup in the English stop-word dictionary.
pub fn is_stopword(word: &str) -> bool {
    STOPWORDS.contains(word.to_lowercase().as_str())
}

/// Split raw text into cleaned phrase segments.
///
/// Decoration characters become paragraph breaks and the text is cut on line
/// breaks and on `". "` / `", "`. Each segment then loses its bracket
/// characters and has its whitespace collapsed and trimmed; empty segments
/// are discarded.
pub fn phrases(text: &str) -> Vec<String> {
    let decorated = DECORATION.replace_all(text, "\n");
    BOUNDARY
        .split(&decorated)
        .map(|segment| {
            let stripped = BRACKETS.replace_all(segment, "");
            WHITESPACE.replace_all(&stripped, " ").trim().to_string()
        })
        .filter(|segment| !segment.is_empty())
        .collect()
}

/// Individual words of the given phrases with stop words removed.
///
/// Surrounding quotes and trailing `.`, `!`, `?` are trimmed from each word
/// before the stop-word lookup, so `"experience."` and `experience` agree.
pub fn keywords<S: AsRef<str>>(phrases: &[S]) -> Vec<String> {
    phrases
        .iter()
        .flat_map(|phrase| phrase.as_ref().split_whitespace())
        .map(|word| word.trim_matches(|c: char| c == '"' || c == '\'').trim_end_matches(['.', '!', '?']))
        .filter(|word| !word.is_empty() && !is_stopword(word))
        .map(str::to_string)
        .collect()
}

/// Canonical normalized form of `text`, used for indexed documents.
///
/// Stripping brackets can leave a fresh `". "` inside a phrase (`"Go.) Rust"`),
/// so the phrases are split once more before joining them with `". "`.
/// Normalizing the output again returns it unchanged.
pub fn normalize(text: &str) -> String {
    phrases(&phrases(text).join("\n")).join(". ")
}

/// A parsed search query: whole phrases plus stop-word-free keywords.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pub phrases: Vec<String>,
    pub keywords: Vec<String>,
}

impl Query {
    pub fn parse(text: &str) -> Self {
        let phrases = phrases(text);
        let keywords = keywords(&phrases);
        Self { phrases, keywords }
    }

    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty() && self.keywords.is_empty()
    }

    /// Keywords first, then phrases; the members of the disjunctive match set.
    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.keywords.iter().chain(self.phrases.iter()).map(String::as_str)
    }
}
