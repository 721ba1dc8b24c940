use rand::{ SeedableRng, rngs::StdRng };
use imps_grassmann::{
    groundstate::{ Family, GradientGrassmann, find_groundstate },
    imps::InfiniteMPS,
    operator::{ NNHamiltonian, ising_exact_energy },
};

const BOND: usize = 8;
const TOL: f64 = 1e-10;
const MAXITER: usize = 500;
const FIELD: &[f64] = &[
    0.20, 0.40, 0.60, 0.80, 0.90, 0.95,
    1.00,
    1.05, 1.10, 1.20, 1.40, 1.60, 2.00,
];

fn main() {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("warn"))
        .init();

    let method: Family =
        match std::env::args().nth(1).map(|arg| arg.parse()) {
            Some(Ok(family)) => family,
            Some(Err(err)) => {
                eprintln!("{}", err);
                std::process::exit(1);
            },
            None => Family::ConjugateGradient,
        };
    let alg = match GradientGrassmann::new(method, TOL, MAXITER, 1) {
        Ok(alg) => alg,
        Err(err) => {
            eprintln!("{}", err);
            std::process::exit(1);
        },
    };

    let mut rng = StdRng::seed_from_u64(10546);
    println!("# method = {}, D = {}", method, BOND);
    println!("{:>6} {:>20} {:>20} {:>12} {:>12}", "g", "e_var", "e_exact", "Δe", "‖∇e‖");
    for &g in FIELD.iter() {
        let ham = NNHamiltonian::transverse_field_ising(1.0, g);
        let psi0 =
            match InfiniteMPS::random_uniform(1, 2, BOND, &mut rng) {
                Ok(psi) => psi,
                Err(err) => {
                    eprintln!("{}", err);
                    std::process::exit(1);
                },
            };
        match find_groundstate(&psi0, &ham, &alg) {
            Ok((_, envs, gradnorm)) => {
                let e_var = envs.energy_density();
                let e_exact = ising_exact_energy(1.0, g);
                println!(
                    "{:6.3} {:20.14} {:20.14} {:12.3e} {:12.3e}",
                    g, e_var, e_exact, e_var - e_exact, gradnorm,
                );
            },
            Err(err) => {
                eprintln!("g = {}: {}", g, err);
            },
        }
    }
}
