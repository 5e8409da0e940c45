use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand, ValueEnum};
use vortex::diagnostics::render_report;
use vortex::parser::{
    Parser as _, lexer, parse_event_action, parse_expression, parse_for_clause,
};
use vortex::{CompiledExpression, LoopScope, Scope, Value};

#[derive(Parser)]
#[command(name = "vortex")]
#[command(about = "Check and evaluate Vortex binding expressions")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether text is accepted by a directive grammar
    Check {
        /// The directive text
        text: String,
        /// Which grammar to check against
        #[arg(long = "as", value_enum, default_value = "expression")]
        grammar: Grammar,
    },
    /// Evaluate an expression against a JSON state
    Eval {
        /// The expression to evaluate
        expression: String,
        /// State object as JSON
        #[arg(long, default_value = "{}")]
        state: String,
        /// Loop item as `name=json`, shadowing state
        #[arg(long)]
        item: Option<String>,
        /// Print the result as JSON instead of display text
        #[arg(long)]
        json: bool,
    },
    /// List the tokens of a piece of directive text
    Tokens {
        text: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Grammar {
    /// bind, show, if and model values
    Expression,
    /// `<item> in <list>`
    For,
    /// The code half of an `on` entry
    Event,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Check { text, grammar } => check(&text, grammar),
        Commands::Eval {
            expression,
            state,
            item,
            json,
        } => eval(&expression, &state, item.as_deref(), json),
        Commands::Tokens { text } => tokens(&text),
    }
}

fn check(text: &str, grammar: Grammar) -> Result<()> {
    let text = text.trim();
    let outcome = match grammar {
        Grammar::Expression => parse_expression(text).map(|expr| {
            let paths: Vec<String> = expr.paths().into_iter().map(|path| path.dotted()).collect();
            format!("reads: [{}]", paths.join(", "))
        }),
        Grammar::For => parse_for_clause(text)
            .map(|clause| format!("item '{}' over '{}'", clause.item, clause.list)),
        Grammar::Event => parse_event_action(text).map(|action| format!("{action:?}")),
    };
    match outcome {
        Ok(summary) => {
            println!("accepted: {summary}");
            Ok(())
        }
        Err(error) => {
            eprintln!("{}", render_report(text, &error));
            bail!("rejected: {error}")
        }
    }
}

fn eval(expression: &str, state: &str, item: Option<&str>, json: bool) -> Result<()> {
    let state: serde_json::Value =
        serde_json::from_str(state).context("--state is not valid JSON")?;
    let Value::Object(root) = Value::from(state) else {
        bail!("--state must be a JSON object");
    };

    let compiled = CompiledExpression::compile(expression);
    if let Some(error) = compiled.error() {
        eprintln!("{}", render_report(compiled.source(), error));
        log::warn!("'{}' is rejected and evaluates to ''", compiled.source());
    }

    let value = match item {
        Some(item) => {
            let (name, item_json) = item
                .split_once('=')
                .ok_or_else(|| anyhow!("--item must look like name=json"))?;
            let item: serde_json::Value = serde_json::from_str(item_json)
                .with_context(|| format!("--item '{name}' is not valid JSON"))?;
            let scope = LoopScope {
                item_name: name.trim(),
                item: Value::from(item),
                parent: &root,
            };
            evaluate_in(&compiled, &scope)?
        }
        None => evaluate_in(&compiled, &root)?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&value.to_json())?);
    } else {
        println!("{}", value.to_display_string());
    }
    Ok(())
}

fn evaluate_in(compiled: &CompiledExpression, scope: &dyn Scope) -> Result<Value> {
    compiled
        .try_evaluate(scope)
        .with_context(|| format!("evaluating '{}'", compiled.source()))
}

fn tokens(text: &str) -> Result<()> {
    let (tokens, errors) = lexer().parse(text).into_output_errors();
    if !errors.is_empty() {
        let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
        bail!("lexer errors: {}", messages.join("; "));
    }
    for token in tokens.unwrap_or_default() {
        let span = token.span.into_range();
        println!("{:>3}..{:<3} {}", span.start, span.end, token.node);
    }
    Ok(())
}
