use mixed_pca::pca::communalities;
use mixed_pca::{run, Column, PipelineConfig, Table};

fn main() {
    let table = Table::new(vec![
        Column::numeric("income", vec![32.0, 45.0, 51.0, 38.0, 70.0, 29.0, 44.0, 61.0]),
        Column::numeric("age", vec![25.0, 41.0, 47.0, 33.0, 58.0, 22.0, 39.0, 50.0]),
        Column::categorical(
            "education",
            ["low", "mid", "high", "mid", "high", "low", "mid", "high"],
        ),
        Column::categorical("region", ["n", "s", "s", "e", "n", "e", "s", "n"]),
    ])
    .expect("survey table is rectangular");

    let config = PipelineConfig::new()
        .ordinal_order("education", ["low", "mid", "high"])
        .nominal(["region"]);

    let report = run(&table, &config).expect("PCA run failed");
    let pca = &report.pca;
    let diagnostics = &report.diagnostics;

    println!("Variables: {:?}", pca.variable_names);
    for (j, (value, ratio)) in pca
        .eigenvalues
        .iter()
        .zip(pca.explained_variance_ratio.iter())
        .enumerate()
    {
        println!(
            "PC{}: eigenvalue {:.4}, {:.2}% of variance, cumulative {:.2}%",
            j + 1,
            value,
            ratio,
            diagnostics.cumulative_variance_percent[j]
        );
    }

    println!("Kaiser criterion retains {} components", diagnostics.kaiser_count);
    let threshold = &diagnostics.variance_threshold;
    println!(
        "{} components reach {:.0}% of variance ({:.2}%)",
        threshold.components, threshold.threshold_percent, threshold.achieved_percent
    );

    println!("Strongest contributors to PC1:");
    for contributor in diagnostics
        .top_contributors(0, 3)
        .expect("PC1 always exists")
    {
        println!("  {:<12} {:+.4}", contributor.variable, contributor.loading);
    }

    let retained = diagnostics.kaiser_count.max(1);
    let communality = communalities(&pca.loadings, retained);
    println!("Communalities with {retained} retained components:");
    for (name, value) in pca.variable_names.iter().zip(communality.iter()) {
        println!("  {:<12} {:.4}", name, value);
    }

    if let Some(scale) = diagnostics.biplot_scale {
        println!("Biplot arrow scale: {scale:.4}");
    }
}
