#![forbid(unsafe_code)]
use rgpio_cli::opts::Opt;
use structopt::StructOpt;

fn main() {
    let opt = Opt::from_args();
    rgpio_cli::init_logging(&opt);
    if let Err(err) = rgpio_cli::run(&opt) {
        println!("{}", err);
        std::process::exit(1);
    }
}
