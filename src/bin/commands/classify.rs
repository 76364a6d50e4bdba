use sqlrescue::lens::timestamp::{ClassifyArgs, TimestampLens};
use sqlrescue::lens::utils::OutputFormat;

pub fn run(args: ClassifyArgs, output_format: OutputFormat) {
    let lens = TimestampLens::new();
    let results = lens.classify_args(&args);
    println!("{}", lens.format_results(&results, &output_format));
}
