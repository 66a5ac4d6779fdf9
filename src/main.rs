fn main() -> anyhow::Result<()> {
    netband::run()
}
