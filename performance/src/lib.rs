use rand::prelude::Distribution;
use rand::Rng;

/// Expands the source with the standard library expanders.
pub fn run_in_weave(input: &str) -> String {
    let mut engine = weave::Engine::new_with_built_ins(weave_stdlib::built_in_expanders());
    engine.options_mut().salt = Some("bench".into());
    engine.expand_source(input).unwrap()
}

/// Lexes the source with the default lexer.
pub fn lex_in_weave(input: &str) -> usize {
    weave::token::lexer::tokenize(input).unwrap().len()
}

/// Declarations prepended to every generated document.
pub const PRELUDE: &str = r"
macro { swap(variable·a, variable·b) } >> { [variable·a, variable·b] = [variable·b, variable·a]; }
macro { unless (···c) } >> { if (!(···c)) }
macro { name_of(ident·f) } >> { ··stringify(ident·f) }
macro { list[·ls(integer·x, ',')·xs] } >> { ··count(xs··· (, ) { integer·x }) }
macro { tmp } >> { $tmp }
ignore { #[···body] }
";

static RANDOM_IDENTIFIERS: [&str; 12] = [
    "alpha", "beta", "gamma", "delta", "value", "count", "index", "result", "left", "right",
    "total", "item",
];

pub struct Weights {
    pub swap: u32,
    pub unless: u32,
    pub name_of: u32,
    pub list: u32,
    pub tmp: u32,
    pub plain: u32,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            swap: 10,
            unless: 10,
            name_of: 10,
            list: 5,
            tmp: 5,
            plain: 60,
        }
    }
}

/// Generates a document of roughly `num_bytes` bytes that calls the macros in [PRELUDE].
pub fn generate_random_document(
    rng: &mut rand::prelude::StdRng,
    num_bytes: usize,
    weights: &Weights,
) -> String {
    let dist = rand::distributions::WeightedIndex::new([
        weights.swap,
        weights.unless,
        weights.name_of,
        weights.list,
        weights.tmp,
        weights.plain,
    ])
    .unwrap();
    let identifier = |rng: &mut rand::prelude::StdRng| {
        RANDOM_IDENTIFIERS[rng.gen_range(0..RANDOM_IDENTIFIERS.len())]
    };
    let mut s = String::from(PRELUDE);
    while s.len() < num_bytes {
        let line = match dist.sample(rng) {
            0 => format!["swap(${}, ${})\n", identifier(rng), identifier(rng)],
            1 => format!["unless ({} < {}) {{ {}(); }}\n", identifier(rng), rng.gen_range(0..100), identifier(rng)],
            2 => format!["print(name_of({}));\n", identifier(rng)],
            3 => {
                let n = rng.gen_range(1..8);
                let items: Vec<String> = (0..n).map(|_| rng.gen_range(0..1000).to_string()).collect();
                format!["n = list[{}];\n", items.join(", ")]
            }
            4 => "tmp = tmp + 1;\n".to_string(),
            _ => format!["{} = {} + {};\n", identifier(rng), identifier(rng), rng.gen_range(0..1000)],
        };
        s.push_str(&line);
    }
    s
}
