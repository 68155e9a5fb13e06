//! Generate static files

use anyhow::Result;

use crate::generator::{GenerateReport, Generator};
use crate::Blog;

/// Generate the site from the configured CMS
pub async fn run(blog: &Blog, force: bool) -> Result<()> {
    let start = std::time::Instant::now();

    let client = blog.cms_client()?;
    let generator = Generator::new(blog)?;
    let (report, _) = generator.generate(&client, force).await?;

    let duration = start.elapsed();
    tracing::info!("Completed in {:.2}s", duration.as_secs_f64());
    print_report(&report);
    Ok(())
}

fn print_report(report: &GenerateReport) {
    if report.skipped {
        println!("Output is still fresh, nothing generated (use --force to regenerate)");
        return;
    }
    println!(
        "Generated {} posts: {} written, {} unchanged, {} removed",
        report.posts, report.written, report.unchanged, report.removed
    );
    if report.failed > 0 {
        println!("{} posts could not be built, see the log", report.failed);
    }
}
