use trnasort::*;

fn main() {
    let fasta = "\
>read1
AACCGTTGAACTGAAAGGTTCCTGGGGTTCGAATCCCCATCTCTCCGCCA
>read2
GAGTACCAAGATCGGAAGAGCACACGTCTAGTTCTACAGTCCGACGATCATCCTTTGG
>read3
AGGCTTGTAGCTCAGGTGGTTAGAGCGCACCCCTGATAAGGGTGAGGTCGGTGGTTCAAGTCCACTCAGGCCTACCAAC
";

    let input = FastaInput::from_reader(fasta.as_bytes()).unwrap_or_else(|e| panic!("{e}"));
    let mut profile = TsvProfileWriter::from_writer(std::io::stdout(), 256)
        .unwrap_or_else(|e| panic!("{e}"));

    let summary = Sorter::new("demo", SortMode::Canonical)
        .run(&input, &mut profile, 1)
        .unwrap_or_else(|e| panic!("{e}"));

    summary
        .stats
        .write_report(std::io::stderr())
        .unwrap_or_else(|e| panic!("{e}"));
}
