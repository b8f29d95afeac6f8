fn main() -> anyhow::Result<()> {
    quietbench_cli::run()
}
