use approx::assert_abs_diff_eq;
use ndarray::Axis;
use single_dictlearn::learning::OnlineLearnerBuilder;
use single_dictlearn::synthetic::{make_sparse_coded_signal, random_dictionary};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn online_learning_end_to_end() {
    init_logger();
    let n_samples = 2000;
    let signal = make_sparse_coded_signal(n_samples, 50, 25, 4, 0).unwrap();

    let learner = OnlineLearnerBuilder::new()
        .lambda(0.02)
        .eval_interval(500)
        .eval_sparsity(4)
        .seed(0)
        .build();
    let n_iter = learner.n_iter_for(n_samples);
    assert_eq!(n_iter, 10 * n_samples);

    let report = learner
        .fit(signal.y().view(), random_dictionary(25, 50, 0))
        .unwrap();

    let expected = n_iter / 500;
    let n_errors = report.errors().len();
    assert!(n_errors + 1 >= expected && n_errors <= expected + 1);
    assert_eq!(report.sparsity().len(), n_iter);
    assert!(report.mean_sparsity().is_finite());
    assert!(report.mean_sparsity() > 0.0);

    assert!(report.errors().last().unwrap() < report.errors().first().unwrap());
    assert!(report.errors().after_burn_in(2).len() == n_errors - 2);

    for atom in report.dictionary().axis_iter(Axis(1)) {
        assert_abs_diff_eq!(atom.dot(&atom).sqrt(), 1.0, epsilon = 1e-9);
    }
}

#[test]
fn online_statistics_count_every_step() {
    let signal = make_sparse_coded_signal(50, 10, 8, 2, 4).unwrap();
    let report = OnlineLearnerBuilder::new()
        .n_iter(120)
        .eval_interval(40)
        .eval_coding_iters(10)
        .build()
        .fit(signal.y().view(), random_dictionary(8, 10, 5))
        .unwrap();

    assert_eq!(report.statistics().n_seen(), 120);
    assert_eq!(report.errors().len(), 3);

    // A is a sum of outer products, so symmetric
    let a = report.statistics().a();
    for i in 0..10 {
        for j in 0..10 {
            assert_abs_diff_eq!(a[[i, j]], a[[j, i]], epsilon = 1e-12);
        }
    }
}
